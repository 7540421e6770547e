//! Error types for the driver.
//!
//! Errors are split by origin so callers can dispatch on them:
//!
//! - [`ArangoError`]: the server answered with its structured error envelope
//!   (`{error, code, errorMessage, errorNum}`), regardless of HTTP status.
//! - [`HttpError`]: a non-2xx/3xx status without an envelope.
//! - [`TransportError`]: the request never produced a server answer. Only
//!   refused connections are eligible for transparent failover retry.

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriverError>;

/// A structured error reported by the server.
///
/// `error_num` is the machine-meaningful discriminator; callers match on it
/// to detect conditions such as "document not found" (see [`codes`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("server error {error_num}: {message}")]
pub struct ArangoError {
    pub error_num: i64,
    /// HTTP status equivalent reported inside the envelope.
    pub code: u16,
    pub message: String,
}

/// A non-success HTTP response that did not carry an error envelope.
#[derive(Debug, Error)]
#[error("unexpected HTTP status {status}")]
pub struct HttpError {
    pub status: StatusCode,
    /// The response body, parsed if it was JSON.
    pub body: Option<Value>,
}

/// A socket-level failure, classified at the transport edge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection refused by {url}")]
    ConnectionRefused { url: String },

    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("transport failure for {url}: {message}")]
    Other { url: String, message: String },
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Arango(#[from] ArangoError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to parse response body as JSON: {source}")]
    Parse {
        /// Lossy text decoding of the offending body.
        text: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("connection is closed")]
    Closed,
}

impl DriverError {
    /// The server error number, if this is a structured server error.
    pub fn arango_error_num(&self) -> Option<i64> {
        match self {
            DriverError::Arango(error) => Some(error.error_num),
            _ => None,
        }
    }

    /// Whether this is a structured server error with the given number.
    pub fn is_arango_error(&self, error_num: i64) -> bool {
        self.arango_error_num() == Some(error_num)
    }
}

/// Well-known server error numbers.
pub mod codes {
    /// Document not found.
    pub const ERROR_ARANGO_DOCUMENT_NOT_FOUND: i64 = 1202;
    /// Collection or view not found.
    pub const ERROR_ARANGO_DATA_SOURCE_NOT_FOUND: i64 = 1203;
    /// Database not found.
    pub const ERROR_ARANGO_DATABASE_NOT_FOUND: i64 = 1228;
    /// Graph not found.
    pub const ERROR_GRAPH_NOT_FOUND: i64 = 1924;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arango_error_num_accessor() {
        let err = DriverError::Arango(ArangoError {
            error_num: 1202,
            code: 404,
            message: "document not found".to_string(),
        });
        assert_eq!(err.arango_error_num(), Some(1202));
        assert!(err.is_arango_error(codes::ERROR_ARANGO_DOCUMENT_NOT_FOUND));
        assert!(!err.is_arango_error(codes::ERROR_GRAPH_NOT_FOUND));
    }

    #[test]
    fn test_non_arango_errors_have_no_error_num() {
        let err = DriverError::Closed;
        assert_eq!(err.arango_error_num(), None);

        let err = DriverError::Transport(TransportError::ConnectionRefused {
            url: "http://localhost:8529/".to_string(),
        });
        assert_eq!(err.arango_error_num(), None);
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Timeout {
            url: "http://localhost:8529/".to_string(),
            timeout_ms: 250,
        };
        assert!(err.to_string().contains("250ms"));
    }
}
