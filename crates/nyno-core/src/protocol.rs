//! Wire types for the Nyno line protocol.
//!
//! Every client message is a single type-tag byte, a compact JSON object and
//! a trailing newline:
//!
//! ```text
//! c{"apiKey":"changeme"}\n
//! q{"path":"/sync/users","userId":42}\n
//! ```
//!
//! The server answers each message with one JSON object per line.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// One-byte prefix identifying the kind of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTag {
    /// Authentication handshake carrying the credential mapping (`c`).
    Credentials,
    /// Workflow query carrying a request envelope (`q`).
    Query,
}

impl MessageTag {
    pub fn as_byte(self) -> u8 {
        match self {
            MessageTag::Credentials => b'c',
            MessageTag::Query => b'q',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'c' => Some(MessageTag::Credentials),
            b'q' => Some(MessageTag::Query),
            _ => None,
        }
    }
}

/// Encode a message as `tag + JSON + '\n'`.
pub fn encode_frame<T: Serialize + ?Sized>(
    tag: MessageTag,
    body: &T,
) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(body)?;
    let mut frame = Vec::with_capacity(json.len() + 2);
    frame.push(tag.as_byte());
    frame.extend_from_slice(&json);
    frame.push(b'\n');
    Ok(frame)
}

/// Body of a `q` message: `{"path": ..., ...extra}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryEnvelope(Map<String, Value>);

impl QueryEnvelope {
    /// Build an envelope for `path`, merging `data` on top.
    ///
    /// Extra fields are applied after `path`, so a `path` key inside `data`
    /// wins over the argument.
    pub fn new(path: &str, data: Option<&Map<String, Value>>) -> Self {
        let mut fields = Map::new();
        fields.insert("path".to_string(), Value::String(path.to_string()));
        if let Some(data) = data {
            for (key, value) in data {
                fields.insert(key.clone(), value.clone());
            }
        }
        Self(fields)
    }

    pub fn path(&self) -> Option<&str> {
        self.0.get("path").and_then(Value::as_str)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// A decoded client message, as seen from the server side of the socket.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub tag: MessageTag,
    pub body: Value,
}

/// Why an inbound line could not be read as a [`Frame`].
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,

    #[error("unknown message tag {0:?}")]
    UnknownTag(char),

    #[error("invalid frame body: {0}")]
    Body(#[from] serde_json::Error),
}

impl Frame {
    /// Parse a single line (with or without its trailing newline).
    pub fn parse(line: &str) -> Result<Self, FrameError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let first = line.bytes().next().ok_or(FrameError::Empty)?;
        let tag = MessageTag::from_byte(first)
            .ok_or_else(|| FrameError::UnknownTag(line.chars().next().unwrap_or('\0')))?;
        let body = serde_json::from_str(&line[1..])?;
        Ok(Self { tag, body })
    }
}

/// Loose truthiness used for the `status` flag of auth responses.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Whether an auth response carries a truthy `status`.
pub fn auth_accepted(response: &Value) -> bool {
    response.get("status").is_some_and(is_truthy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_credentials_frame() {
        let frame = encode_frame(MessageTag::Credentials, &json!({"apiKey": "changeme"})).unwrap();
        assert_eq!(frame, b"c{\"apiKey\":\"changeme\"}\n".to_vec());
    }

    #[test]
    fn test_query_envelope_merges_data() {
        let data = json!({"userId": 42, "action": "sync"});
        let envelope = QueryEnvelope::new("/sync/users", data.as_object());
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"path": "/sync/users", "userId": 42, "action": "sync"})
        );
    }

    #[test]
    fn test_query_envelope_data_overrides_path() {
        let data = json!({"path": "/other"});
        let envelope = QueryEnvelope::new("/sync/users", data.as_object());
        assert_eq!(envelope.path(), Some("/other"));
    }

    #[test]
    fn test_query_envelope_without_data() {
        let envelope = QueryEnvelope::new("/health", None);
        assert_eq!(envelope.into_inner().len(), 1);
    }

    #[test]
    fn test_frame_parse() {
        let frame = Frame::parse("q{\"path\":\"/a\"}\n").unwrap();
        assert_eq!(frame.tag, MessageTag::Query);
        assert_eq!(frame.body, json!({"path": "/a"}));
    }

    #[test]
    fn test_frame_parse_rejects_unknown_tag() {
        assert!(matches!(Frame::parse("x{}"), Err(FrameError::UnknownTag('x'))));
        assert!(matches!(Frame::parse(""), Err(FrameError::Empty)));
        assert!(matches!(Frame::parse("c{oops"), Err(FrameError::Body(_))));
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!({"system": "systemA"})));
    }

    #[test]
    fn test_auth_accepted() {
        assert!(auth_accepted(&json!({"status": true})));
        assert!(!auth_accepted(&json!({"status": false})));
        assert!(!auth_accepted(&json!({"error": "bad key"})));
        assert!(!auth_accepted(&json!([1, 2])));
    }
}
