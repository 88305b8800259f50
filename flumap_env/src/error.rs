//! Error types for the FluMap environment abstraction.

use thiserror::Error;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// Connection failed (refused, reset, DNS, TLS, ...)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Backend answered with a non-success status
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// Response body could not be read
    #[error("Body error: {0}")]
    BodyError(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Creates a body error.
    pub fn body(msg: impl Into<String>) -> Self {
        Self::BodyError(msg.into())
    }
}
