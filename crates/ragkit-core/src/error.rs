//! Error taxonomy shared by every gateway and the orchestrator.
//!
//! Backends classify their failures as [`Error::Transient`] or
//! [`Error::Permanent`]; the retry wrapper only ever re-attempts the former.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::UpsertReport;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input for `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Transient backend failure: {0}")]
    Transient(String),

    #[error("Backend rejected the request: {0}")]
    Permanent(String),

    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Partial upsert: {} of {} vectors written, {} batch(es) failed", .0.upserted, .0.total, .0.failed.len())]
    PartialUpsert(UpsertReport),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput { field: field.into(), reason: reason.into() }
    }

    /// Whether the retry wrapper may re-attempt the call that produced this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Permanent(_) => ErrorKind::Backend,
            Self::RetriesExhausted { source, .. } => source.kind(),
            Self::PartialUpsert(_) => ErrorKind::PartialFailure,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Operation(_) => ErrorKind::Internal,
        }
    }

    /// Classify a non-success HTTP response from an external backend.
    ///
    /// 408/409/429 and 5xx are transient, except a 429 carrying an
    /// `insufficient_quota` code which no amount of waiting will fix.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let detail = format!("HTTP {status}: {}", body.trim());
        match status {
            429 if body.contains("insufficient_quota") => Self::Permanent(detail),
            408 | 409 | 429 | 500..=599 => Self::Transient(detail),
            _ => Self::Permanent(detail),
        }
    }
}

/// Stable, machine-readable error category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    InvalidInput,
    DimensionMismatch,
    Transient,
    Backend,
    PartialFailure,
    NotFound,
    Internal,
}

/// Structured error body handed to the request-handling layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub message: String,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self { error: err.kind(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_classification() {
        assert!(Error::from_http_status(503, "unavailable").is_transient());
        assert!(Error::from_http_status(429, "{\"error\":{\"code\":\"rate_limit_exceeded\"}}").is_transient());
        assert!(!Error::from_http_status(429, "{\"error\":{\"code\":\"insufficient_quota\"}}").is_transient());
        assert!(!Error::from_http_status(401, "bad key").is_transient());
        assert!(!Error::from_http_status(400, "malformed").is_transient());
    }

    #[test]
    fn exhausted_retries_keep_underlying_kind() {
        let err = Error::RetriesExhausted {
            operation: "embed".into(),
            attempts: 3,
            source: Box::new(Error::Transient("timeout".into())),
        };
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(!err.is_transient(), "an exhausted error is final");
        assert!(err.to_string().contains("3 attempt"));
    }
}
