//! Error types for xhr-shim

use thiserror::Error;

/// Failures reported by an [`HttpTransport`](crate::network::HttpTransport)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The call was cancelled through its cancellation token
    #[error("request aborted")]
    Aborted,
    /// The target URL could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Connecting or exchanging headers failed
    #[error("connection failed: {0}")]
    Connection(String),
    /// Reading the response body failed
    #[error("body stream failed: {0}")]
    Body(String),
}

impl TransportError {
    /// Whether this failure is a cancellation rather than a network fault
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Main error type for xhr-shim operations
#[derive(Debug, Error)]
pub enum XhrError {
    /// An accessor was used in a state that does not allow it
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The operation is part of the legacy surface but not implemented
    #[error("not supported: {0}")]
    NotSupported(String),
    /// Unknown `responseType` string
    #[error("invalid response type: {0:?}")]
    InvalidResponseType(String),
    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The accumulated body is not valid JSON
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl XhrError {
    /// Whether this error came from a cancelled transport call
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_abort())
    }
}

/// Convenience Result type for xhr-shim operations
pub type Result<T> = std::result::Result<T, XhrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_classification() {
        assert!(XhrError::from(TransportError::Aborted).is_abort());
        assert!(!XhrError::from(TransportError::Connection("refused".into())).is_abort());
        assert!(!XhrError::InvalidState("x".into()).is_abort());
    }

    #[test]
    fn test_display() {
        let err = XhrError::from(TransportError::InvalidUrl("nope".into()));
        assert_eq!(err.to_string(), "invalid URL: nope");
    }
}
