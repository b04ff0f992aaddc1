//! The `hello` greeting command.

use serde_json::Value;

use crate::{Context, Extension};

/// Context key set on every run.
pub const MARKER_KEY: &str = "custom_hello_var";

/// Greets the first argument, or "World".
pub struct Hello;

impl Extension for Hello {
    fn name(&self) -> &str {
        "hello"
    }

    fn run(&self, args: &[String], context: &mut Context) -> String {
        let name = args
            .first()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("World");
        context.insert(MARKER_KEY.to_string(), Value::String("hello".to_string()));
        format!("Hello, {}!", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greets_first_argument() {
        let mut context = Context::new();
        let args = vec!["Nyno".to_string(), "ignored".to_string()];
        assert_eq!(Hello.run(&args, &mut context), "Hello, Nyno!");
        assert_eq!(context[MARKER_KEY], "hello");
    }

    #[test]
    fn test_defaults_to_world() {
        let mut context = Context::new();
        assert_eq!(Hello.run(&[], &mut context), "Hello, World!");
        assert_eq!(Hello.run(&[String::new()], &mut context), "Hello, World!");
    }

    #[test]
    fn test_keeps_existing_context() {
        let mut context = Context::new();
        context.insert("USER_OUTPUT".to_string(), Value::from("alice"));
        Hello.run(&[], &mut context);
        assert_eq!(context.len(), 2);
        assert_eq!(context["USER_OUTPUT"], "alice");
    }
}
