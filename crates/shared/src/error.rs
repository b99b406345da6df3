use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error body the server attaches to failed responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Uniform error surfaced to the dispatching layer when the generate-code
/// action fails, regardless of whether the failure was a non-200 status or a
/// transport-level rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GenerateCodeError {
    pub message: String,
}

impl GenerateCodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A remote call that never produced a usable HTTP outcome: the connection
/// failed, or the server answered with a structured error body instead of a
/// payload. Status 0 means no HTTP response was received at all.
#[derive(Debug, Clone, Error)]
#[error("Status: {status}, Message: {message}")]
pub struct TransportFailure {
    pub status: u16,
    pub message: String,
}

impl TransportFailure {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn no_response(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }
}
