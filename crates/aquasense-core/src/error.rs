//! Error types for aquasense-core.
//!
//! This module defines all error types that can occur when talking to the
//! AquaSense backend.
//!
//! # Error Handling Strategies
//!
//! No request is retried automatically. What happens next depends on the
//! category of failure:
//!
//! | Error Type | Inside a poll cycle | Elsewhere |
//! |------------|---------------------|-----------|
//! | [`Error::Network`] | Cycle marked disconnected, value held | Surface to user |
//! | [`Error::Unauthorized`] | Cycle marked disconnected, session torn down | Session torn down, login required |
//! | [`Error::Validation`] | Never reaches the poller | Surface inline, nothing was sent |
//! | [`Error::ServerRejection`] | Cycle marked disconnected, value held | Surface backend message verbatim |
//! | [`Error::Decode`] | Value held | Surface to user |
//! | [`Error::Cancelled`] | Result discarded | Ignore |
//!
//! ## Poll cycles
//!
//! [`Error::is_cycle_fatal`] decides whether a per-metric failure marks the
//! whole snapshot as offline: any failed request does. A 2xx record without
//! the expected field only degrades that metric.
//!
//! ```
//! use aquasense_core::Error;
//!
//! assert!(Error::Unauthorized.is_cycle_fatal());
//! assert!(!Error::Validation("bad".into()).is_cycle_fatal());
//! assert!(Error::rejected(503, "down").is_cycle_fatal());
//! assert!(!Error::Decode("no ph field".into()).is_cycle_fatal());
//! ```

use thiserror::Error;

use aquasense_types::ParseError;

/// Errors that can occur when talking to the backend.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No response was received (connection refused, DNS, timeout).
    #[error("Backend not reachable at {url}: {message}")]
    Network { url: String, message: String },

    /// The backend rejected the bearer token (HTTP 401).
    #[error("Not authorized; please log in again")]
    Unauthorized,

    /// Input was rejected locally before any request was sent.
    #[error("{0}")]
    Validation(String),

    /// The request was well-formed but the backend declined it.
    #[error("{message}")]
    ServerRejection {
        /// HTTP status, or 200 when the backend declined inside a 2xx body.
        status: u16,
        /// Backend-provided message, or a generic description.
        message: String,
    },

    /// The configured base URL is not usable.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Reading or writing durable session state failed.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a backend rejection with the given status and message.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::ServerRejection {
            status,
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// `true` for request-layer failures that mark a whole poll cycle as
    /// disconnected: no response, a rejected token, or any other non-2xx
    /// status.
    #[must_use]
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            Error::Network { .. } | Error::Unauthorized | Error::ServerRejection { .. }
        )
    }

    /// `true` if this is an authorization failure.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidDeviceId(_) | ParseError::InvalidAction(_) => {
                Error::Validation(err.to_string())
            }
            other => Error::Decode(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Result type alias using aquasense-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Network {
            url: "http://localhost:8000/sensors/latest/ph".into(),
            message: "connection refused".into(),
        };
        assert_eq!(
            format!("{}", err),
            "Backend not reachable at http://localhost:8000/sensors/latest/ph: connection refused"
        );

        let err = Error::rejected(400, "Username already registered");
        assert_eq!(format!("{}", err), "Username already registered");

        let err = Error::invalid_config("interval must be between 3 and 60 seconds");
        assert_eq!(
            format!("{}", err),
            "Invalid configuration: interval must be between 3 and 60 seconds"
        );
    }

    #[test]
    fn test_cycle_fatal_classification() {
        assert!(
            Error::Network {
                url: String::new(),
                message: String::new()
            }
            .is_cycle_fatal()
        );
        assert!(Error::Unauthorized.is_cycle_fatal());
        assert!(Error::rejected(500, "boom").is_cycle_fatal());
        assert!(Error::rejected(404, "missing").is_cycle_fatal());
        assert!(!Error::Decode("bad".into()).is_cycle_fatal());
        assert!(!Error::Cancelled.is_cycle_fatal());
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: Error = ParseError::InvalidDeviceId("a b".into()).into();
        assert!(matches!(err, Error::Validation(_)));

        let err: Error = ParseError::MissingField { field: "ph" }.into();
        assert!(matches!(err, Error::Decode(_)));
    }
}
