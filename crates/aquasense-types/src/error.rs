//! Error types for data parsing in aquasense-types.

use thiserror::Error;

/// Errors that can occur when interpreting records returned by the backend.
///
/// This error type is transport-agnostic and does not include
/// HTTP-specific errors (those belong in aquasense-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The record did not contain the metric-specific value field.
    #[error("Record is missing numeric field '{field}'")]
    MissingField { field: &'static str },

    /// A timestamp string could not be parsed.
    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    /// Unknown metric name.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Device identifier is not acceptable.
    #[error("Invalid device id '{0}': expected 1-32 ASCII letters, digits, '-' or '_'")]
    InvalidDeviceId(String),

    /// Device action is neither `on` nor `off`.
    #[error("Invalid device action '{0}': expected 'on' or 'off'")]
    InvalidAction(String),

    /// Anything else that does not fit the expected shape.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using aquasense-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
