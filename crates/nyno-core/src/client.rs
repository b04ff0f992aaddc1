//! TCP session client for the Nyno server.
//!
//! A session owns at most one socket and runs strictly one request at a
//! time: `connect` authenticates, `run_workflow` sends a query and waits for
//! its single response line, `close` releases the socket.

use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::protocol::{auth_accepted, encode_frame, MessageTag, QueryEnvelope};
use crate::reader::LineReader;

/// Errors that can occur when talking to the server.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Authentication failed: {response}")]
    Authentication { response: Value },

    #[error("Not connected (call connect first)")]
    NotConnected,

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("Malformed response line: {source}")]
    Protocol {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response is not valid UTF-8: {0}")]
    InvalidUtf8(#[source] std::str::Utf8Error),

    #[error("Workflow path must not be empty")]
    InvalidPath,

    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket error: {0}")]
    Io(#[source] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl ClientError {
    /// Classify a socket error. Timeouts and peer resets get their own
    /// variants so callers can tell them apart.
    pub fn from_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => ClientError::Timeout,
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => ClientError::ConnectionClosed,
            _ => ClientError::Io(err),
        }
    }

    /// Whether the socket can no longer be trusted to be in step with the
    /// server (a reply may still be in flight, or the peer is gone).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout
                | ClientError::ConnectionClosed
                | ClientError::Io(_)
                | ClientError::InvalidUtf8(_)
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Authentication { .. } => "AUTH_FAILED",
            ClientError::NotConnected => "NOT_CONNECTED",
            ClientError::ConnectionClosed => "CONNECTION_CLOSED",
            ClientError::Timeout => "TIMEOUT",
            ClientError::Protocol { .. } | ClientError::InvalidUtf8(_) => "PROTOCOL_ERROR",
            ClientError::InvalidPath => "INVALID_PATH",
            ClientError::Connect { .. } => "CONNECT_FAILED",
            ClientError::Io(_) => "IO_ERROR",
            ClientError::Serialize(_) => "SERIALIZE_ERROR",
        }
    }
}

/// A single authenticated connection to the server.
pub struct Session {
    config: SessionConfig,
    stream: Option<TcpStream>,
    reader: LineReader,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    /// Create a session. No socket is opened until [`Session::connect`].
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            stream: None,
            reader: LineReader::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the socket and authenticate.
    ///
    /// Returns the server's auth response. When the server rejects the
    /// credentials the socket stays open; closing it is up to the caller.
    pub fn connect(&mut self) -> Result<Value, ClientError> {
        self.close();

        let stream = open_stream(&self.config)?;
        self.stream = Some(stream);

        let frame = encode_frame(MessageTag::Credentials, &self.config.credentials)
            .map_err(ClientError::Serialize)?;
        self.send(&frame)?;

        let response = self.receive()?;
        if !auth_accepted(&response) {
            warn!(addr = %self.config.addr(), "Authentication rejected");
            return Err(ClientError::Authentication { response });
        }

        debug!(addr = %self.config.addr(), "Authenticated");
        Ok(response)
    }

    /// Run the workflow registered under `path` and return its response.
    pub fn run_workflow(
        &mut self,
        path: &str,
        data: Option<&Map<String, Value>>,
    ) -> Result<Value, ClientError> {
        if self.stream.is_none() {
            return Err(ClientError::NotConnected);
        }
        if path.is_empty() {
            return Err(ClientError::InvalidPath);
        }

        let envelope = QueryEnvelope::new(path, data);
        let frame = encode_frame(MessageTag::Query, &envelope).map_err(ClientError::Serialize)?;

        debug!(path, "Running workflow");
        self.send(&frame)?;
        self.receive()
    }

    /// Close the socket. Safe to call when already closed.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone; dropping the stream is what matters.
            let _ = stream.shutdown(Shutdown::Both);
            debug!(addr = %self.config.addr(), "Connection closed");
        }
        self.reader.clear();
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), ClientError> {
        let result = self.write_frame(frame);
        self.close_on_transport_error(result)
    }

    fn receive(&mut self) -> Result<Value, ClientError> {
        let result = self.read_response();
        self.close_on_transport_error(result)
    }

    /// Drop the socket after a transport failure so a late reply is never
    /// handed to the next request.
    fn close_on_transport_error<T>(
        &mut self,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        if let Err(ref e) = result {
            if e.is_transport() {
                warn!(
                    addr = %self.config.addr(),
                    error = %e,
                    "Closing connection after transport error"
                );
                self.close();
            }
        }
        result
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        trace!(tag = %char::from(frame[0]), bytes = frame.len(), "Sending frame");
        stream.write_all(frame).map_err(ClientError::from_io)?;
        stream.flush().map_err(ClientError::from_io)?;
        Ok(())
    }

    fn read_response(&mut self) -> Result<Value, ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        let line = self.reader.read_line(stream)?;
        trace!(line = %line, "Received line");

        match serde_json::from_str(&line) {
            Ok(value) => Ok(value),
            Err(source) => Err(ClientError::Protocol { line, source }),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolve the configured address and connect to the first reachable one,
/// with the session timeout on connect, read and write.
fn open_stream(config: &SessionConfig) -> Result<TcpStream, ClientError> {
    let addr = config.addr();
    debug!(addr = %addr, "Connecting to Nyno server");

    let candidates = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|source| ClientError::Connect {
            addr: addr.clone(),
            source,
        })?;

    let mut last_err = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, config.timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(config.timeout))
                    .map_err(ClientError::Io)?;
                stream
                    .set_write_timeout(Some(config.timeout))
                    .map_err(ClientError::Io)?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    let source = last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "no addresses resolved")
    });
    match source.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Err(ClientError::Timeout),
        _ => Err(ClientError::Connect { addr, source }),
    }
}

/// Render a client-side error in the same shape the CLI prints for failures.
pub fn format_client_error(err: &ClientError) -> Value {
    let details = match err {
        ClientError::Authentication { response } => Some(response.clone()),
        ClientError::Protocol { line, .. } => Some(serde_json::json!({ "line": line })),
        ClientError::Connect { addr, source } => Some(serde_json::json!({
            "addr": addr,
            "exception_type": format!("{:?}", source.kind()),
        })),
        ClientError::Io(e) => Some(serde_json::json!({
            "exception_type": format!("{:?}", e.kind()),
        })),
        _ => None,
    };

    serde_json::json!({
        "ok": false,
        "error": {
            "code": err.code(),
            "message": err.to_string(),
            "details": details,
        }
    })
}

/// Serialize a response for output, optionally pretty-printed.
pub fn emit_response(response: &Value, pretty: bool) -> String {
    if pretty {
        serde_json::to_string_pretty(response).unwrap_or_else(|_| "null".to_string())
    } else {
        serde_json::to_string(response).unwrap_or_else(|_| "null".to_string())
    }
}
