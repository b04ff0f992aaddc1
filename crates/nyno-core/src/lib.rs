//! Client library for the Nyno workflow server.
//!
//! The server speaks a line-delimited JSON protocol over TCP: the client
//! authenticates with a `c` message, then runs workflows with `q` messages,
//! reading exactly one JSON line back for each.
//!
//! ```no_run
//! use nyno_core::{Session, SessionConfig};
//! use serde_json::json;
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.connect()?;
//! let data = json!({"userId": 42, "action": "sync"});
//! let result = session.run_workflow("/sync/users", data.as_object())?;
//! println!("{result}");
//! session.close();
//! # Ok::<(), nyno_core::ClientError>(())
//! ```

pub mod client;
pub mod config;
pub mod protocol;
pub mod reader;

// Re-export commonly used types
pub use client::{emit_response, format_client_error, ClientError, Session};
pub use config::{ConfigError, Credentials, SessionConfig};
pub use protocol::{Frame, MessageTag, QueryEnvelope};
