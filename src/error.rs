//! Error types for the LRU eviction controller
//!
//! Variants follow the containment levels of the control loop: record and
//! node failures are skipped, config failures skip a pass, dispatch failures
//! skip a set, and startup failures end the process.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the LRU eviction controller
#[derive(Error, Debug)]
pub enum Error {
    /// Node unreachable, refused the connection or dropped it mid-request
    #[error("Connection to {address} failed: {reason}")]
    Connection { address: String, reason: String },

    /// Malformed frame or unexpected reply from a node
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Introspection text is missing a required key or holds a bad value
    #[error("Failed to parse '{key}': {reason}")]
    Parse { key: String, reason: String },

    /// Invalid watermark or controller inputs
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remove-by-age invocation failed for one set
    #[error("Eviction dispatch failed for set {set_name}: {reason}")]
    Dispatch { set_name: String, reason: String },

    /// Startup failure with no degraded mode (client, UDF registration)
    #[error("Startup failed: {0}")]
    Startup(String),

    /// Operation did not complete in time
    #[error("Timed out during {operation}")]
    Timeout { operation: String },

    /// Shutdown was requested while the operation was in progress
    #[error("Operation cancelled by shutdown")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a parse error for a given key
    pub fn parse(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Parse {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Build a connection error for a given address
    pub fn connection(address: impl Into<String>, reason: impl ToString) -> Self {
        Error::Connection {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error only affects a single node for the current pass
    pub fn is_node_scoped(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. }
                | Error::Protocol(_)
                | Error::Parse { .. }
                | Error::Timeout { .. }
                | Error::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_key() {
        let err = Error::parse("objects", "missing");
        assert_eq!(err.to_string(), "Failed to parse 'objects': missing");
    }

    #[test]
    fn test_connection_error_display() {
        let err = Error::connection("10.0.0.1:3000", "connection refused");
        assert_eq!(
            err.to_string(),
            "Connection to 10.0.0.1:3000 failed: connection refused"
        );
    }

    #[test]
    fn test_error_scopes() {
        assert!(Error::connection("a:1", "x").is_node_scoped());
        assert!(Error::parse("buckets", "x").is_node_scoped());
        assert!(Error::Protocol("bad frame".into()).is_node_scoped());
        assert!(!Error::Config("zero nodes".into()).is_node_scoped());
        assert!(!Error::Dispatch {
            set_name: "lru".into(),
            reason: "x".into()
        }
        .is_node_scoped());
        assert!(!Error::Cancelled.is_node_scoped());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
