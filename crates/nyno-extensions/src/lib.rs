//! Extension commands that workflow nodes can call by name.
//!
//! Each command receives the node's argument list and the shared workflow
//! context, may record values in that context, and returns its output text.

pub mod hello;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub use hello::Hello;

/// Mutable key/value state shared between workflow nodes.
pub type Context = Map<String, Value>;

/// A named command handler.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, args: &[String], context: &mut Context) -> String;
}

/// Extensions available for dispatch, keyed by command name.
#[derive(Default)]
pub struct ExtensionRegistry {
    commands: BTreeMap<String, Box<dyn Extension>>,
}

impl ExtensionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in commands.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Hello));
        registry
    }

    /// Add a command, replacing any previous one with the same name.
    pub fn register(&mut self, extension: Box<dyn Extension>) {
        self.commands.insert(extension.name().to_string(), extension);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Extension> {
        self.commands.get(name).map(|ext| &**ext)
    }

    /// Registered command names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// Run `name` if it is registered.
    pub fn run(&self, name: &str, args: &[String], context: &mut Context) -> Option<String> {
        self.get(name).map(|ext| ext.run(args, context))
    }
}
