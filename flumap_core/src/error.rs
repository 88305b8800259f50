//! Error taxonomy for the choropleth pipeline.

use flumap_env::EnvError;
use thiserror::Error;

/// Failures of one logical fetch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Non-success status or connection error
    #[error("{0}")]
    NetworkFailure(String),

    /// Unparsable body or missing required fields
    #[error("{0}")]
    MalformedPayload(String),

    /// Every attempt failed; carries the last underlying failure
    #[error("{last}")]
    RetriesExhausted { attempts: u32, last: Box<FetchError> },

    /// A newer selection was issued while this one was in flight
    #[error("generation {generation} superseded by {latest}")]
    Superseded { generation: u64, latest: u64 },
}

impl FetchError {
    /// Creates a malformed-payload error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    /// Network and payload failures are retried; the rest are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_) | Self::MalformedPayload(_))
    }

    /// The innermost failure (unwraps `RetriesExhausted`).
    pub fn last_failure(&self) -> &FetchError {
        match self {
            Self::RetriesExhausted { last, .. } => last.last_failure(),
            other => other,
        }
    }
}

impl From<EnvError> for FetchError {
    fn from(err: EnvError) -> Self {
        Self::NetworkFailure(err.to_string())
    }
}

/// Bounding-box problems. Guarded inside the framing engine, never shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FramingError {
    #[error("degenerate bounds: lon span {lon_span}, lat span {lat_span}")]
    DegenerateBounds { lon_span: f64, lat_span: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::NetworkFailure("x".into()).is_retryable());
        assert!(FetchError::malformed("x").is_retryable());
        assert!(!FetchError::Superseded { generation: 1, latest: 2 }.is_retryable());
    }

    #[test]
    fn test_exhausted_displays_last_failure() {
        let err = FetchError::RetriesExhausted {
            attempts: 3,
            last: Box::new(EnvError::Status(502).into()),
        };
        assert_eq!(err.to_string(), "HTTP error! status: 502");
        assert_eq!(
            err.last_failure(),
            &FetchError::NetworkFailure("HTTP error! status: 502".into())
        );
    }
}
