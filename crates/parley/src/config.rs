//! Server configuration.
//!
//! Defaults are fixed; only the listening port may be overridden from the
//! environment (`PORT`). The binaries layer command-line flags on top.

use parley_session::{DEFAULT_MAX_CLIENTS, SessionConfig};
use parley_transport::DEFAULT_BUFFER_SIZE;

/// Port used when neither a flag nor `PORT` provides a valid one.
pub const DEFAULT_PORT: u16 = 8080;

/// Interface the server listens on by default.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Environment variable consulted for the listening port.
pub const PORT_ENV: &str = "PORT";

/// Errors in user-supplied configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The value is not a port number in `1..=65535`.
    #[error("invalid port {0:?}: expected a number from 1 to 65535")]
    InvalidPort(String),
}

/// Everything needed to start a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Maximum simultaneously registered members.
    pub max_clients: usize,
    /// Maximum bytes read per receive call.
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    /// Defaults, with the port taken from `PORT` when it is set and valid.
    pub fn from_env() -> Self {
        let raw = std::env::var(PORT_ENV).ok();
        Self::default().with_port_override(raw.as_deref())
    }

    /// Applies a textual port override. An invalid value is logged and
    /// ignored, leaving the current port in place.
    pub fn with_port_override(mut self, raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return self;
        };
        match parse_port(raw) {
            Ok(port) => self.port = port,
            Err(e) => {
                tracing::warn!(error = %e, port = self.port, "ignoring port override");
            }
        }
        self
    }

    /// The `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The membership settings derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_clients: self.max_clients,
        }
    }
}

/// Parses a port number, rejecting 0 and anything non-numeric.
pub fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| ConfigError::InvalidPort(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_parse_port_accepts_valid_range() {
        assert_eq!(parse_port("1").unwrap(), 1);
        assert_eq!(parse_port(" 9000 ").unwrap(), 9000);
        assert_eq!(parse_port("65535").unwrap(), 65535);
    }

    #[test]
    fn test_parse_port_rejects_zero_and_garbage() {
        assert!(matches!(parse_port("0"), Err(ConfigError::InvalidPort(_))));
        assert!(parse_port("65536").is_err());
        assert!(parse_port("-1").is_err());
        assert!(parse_port("http").is_err());
        assert!(parse_port("").is_err());
    }

    #[test]
    fn test_port_override_valid_replaces_port() {
        let config = ServerConfig::default().with_port_override(Some("9001"));
        assert_eq!(config.port, 9001);
    }

    #[test]
    fn test_port_override_invalid_keeps_default() {
        let config = ServerConfig::default().with_port_override(Some("nope"));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_port_override_absent_keeps_port() {
        let config = ServerConfig {
            port: 7000,
            ..ServerConfig::default()
        }
        .with_port_override(None);
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_session_config_carries_max_clients() {
        let config = ServerConfig {
            max_clients: 2,
            ..ServerConfig::default()
        };
        assert_eq!(config.session_config().max_clients, 2);
    }
}
