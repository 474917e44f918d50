//! Error types and handling
//!
//! Common error type used by the capture, mixing and recording components.

use thiserror::Error;

/// Errors raised by the public recording operations
#[derive(Error, Debug)]
pub enum RecorderError {
    /// A required track is missing or unusable. State is unchanged.
    #[error("{0}")]
    InvalidArgument(String),

    /// The operation needs an idle component but a session is running.
    #[error("{0}: session already active")]
    AlreadyActive(&'static str),

    /// The operation needs a running session.
    #[error("{0}: no active session")]
    NotActive(&'static str),

    /// The chunked recorder could not be constructed.
    #[error("recorder initialization failed: {0}")]
    RecorderInit(String),

    /// Nothing has been recorded yet.
    #[error("there is no recorded data")]
    NoDataAvailable,

    /// An operation that spawns tasks was called outside of a tokio runtime.
    #[error("async runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecorderError {
    /// Short machine-readable code, stable across messages
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::InvalidArgument(_) => "INVALID_ARGUMENT",
            RecorderError::AlreadyActive(_) => "ALREADY_ACTIVE",
            RecorderError::NotActive(_) => "NOT_ACTIVE",
            RecorderError::RecorderInit(_) => "RECORDER_INIT_ERROR",
            RecorderError::NoDataAvailable => "NO_DATA_AVAILABLE",
            RecorderError::Runtime(_) => "RUNTIME_ERROR",
            RecorderError::Io(_) => "IO_ERROR",
            RecorderError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_and_codes() {
        let err = RecorderError::AlreadyActive("createCanvasStream");
        assert_eq!(err.to_string(), "createCanvasStream: session already active");
        assert_eq!(err.code(), "ALREADY_ACTIVE");

        let err = RecorderError::NotActive("replaceVideoStream");
        assert_eq!(err.to_string(), "replaceVideoStream: no active session");

        assert_eq!(RecorderError::NoDataAvailable.code(), "NO_DATA_AVAILABLE");
    }
}
