//! Connection settings for a [`Session`](crate::client::Session).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6001;
pub const DEFAULT_API_KEY: &str = "changeme";
pub const DEFAULT_TIMEOUT_SECS: f64 = 2.0;

/// Errors raised while building a [`SessionConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid timeout: {0} (must be a positive number of seconds)")]
    InvalidTimeout(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(#[source] serde_json::Error),
}

/// Key/value pairs sent verbatim during the authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }

    /// Credentials holding only an `apiKey`.
    pub fn api_key(key: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("apiKey".to_string(), key.into());
        Self(fields)
    }

    /// Parse a JSON object of string values, e.g. `{"apiKey": "keyA123"}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::InvalidCredentials)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::api_key(DEFAULT_API_KEY)
    }
}

/// Everything a session needs before it opens its socket.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    /// Applied to connect, read and write.
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            port,
            credentials,
            ..Self::default()
        }
    }

    /// Set the timeout from fractional seconds.
    pub fn with_timeout_secs(mut self, secs: f64) -> Result<Self, ConfigError> {
        self.timeout = parse_timeout(secs)?;
        Ok(self)
    }

    /// Defaults overridden by `NYNO_HOST`, `NYNO_PORT`, `NYNO_API_KEY` and
    /// `NYNO_TIMEOUT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(host) = lookup("NYNO_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("NYNO_PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidPort(port))?;
        }
        if let Some(key) = lookup("NYNO_API_KEY") {
            config.credentials = Credentials::api_key(key);
        }
        if let Some(timeout) = lookup("NYNO_TIMEOUT") {
            let secs: f64 = timeout
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(timeout.clone()))?;
            config.timeout = parse_timeout(secs)?;
        }
        Ok(config)
    }

    /// `host:port` as used for resolution and in error messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Convert fractional seconds into a socket timeout.
///
/// Zero is rejected because std sockets refuse a zero timeout.
pub fn parse_timeout(secs: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(ConfigError::InvalidTimeout(secs.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:6001");
        assert_eq!(config.credentials.get("apiKey"), Some("changeme"));
        assert_eq!(config.timeout, Duration::from_millis(2000));
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout(0.5).unwrap(), Duration::from_millis(500));
        assert!(parse_timeout(0.0).is_err());
        assert!(parse_timeout(-1.0).is_err());
        assert!(parse_timeout(f64::NAN).is_err());
    }

    #[test]
    fn test_credentials_from_json() {
        let creds = Credentials::from_json(r#"{"apiKey": "keyA123", "tenant": "systemA"}"#).unwrap();
        assert_eq!(creds.get("apiKey"), Some("keyA123"));
        assert_eq!(creds.get("tenant"), Some("systemA"));
        assert!(Credentials::from_json(r#"{"apiKey": 5}"#).is_err());
        assert!(Credentials::from_json("[]").is_err());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let env: HashMap<&str, &str> = [
            ("NYNO_HOST", "nyno.internal"),
            ("NYNO_PORT", "7001"),
            ("NYNO_API_KEY", "keyB456"),
            ("NYNO_TIMEOUT", "0.25"),
        ]
        .into_iter()
        .collect();
        let config = SessionConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.addr(), "nyno.internal:7001");
        assert_eq!(config.credentials, Credentials::api_key("keyB456"));
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_from_lookup_rejects_bad_port() {
        let result = SessionConfig::from_lookup(|k| (k == "NYNO_PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidPort(_))));
    }
}
