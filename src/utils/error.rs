//! Error types and handling
//!
//! Common error types used across the recorder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recorder-wide error type
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Failed to launch encoder: {0}")]
    EncoderLaunch(String),

    #[error("Failed to initialize audio input: {0}")]
    AudioInit(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Recorder event loop has shut down")]
    Closed,
}

impl RecorderError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::AlreadyRecording => "ALREADY_RECORDING",
            RecorderError::EncoderUnavailable(_) => "ENCODER_UNAVAILABLE",
            RecorderError::EncoderLaunch(_) => "ENCODER_LAUNCH_ERROR",
            RecorderError::AudioInit(_) => "AUDIO_INIT_ERROR",
            RecorderError::Platform(_) => "PLATFORM_ERROR",
            RecorderError::Io(_) => "IO_ERROR",
            RecorderError::Config(_) => "CONFIG_ERROR",
            RecorderError::Closed => "CLOSED",
        }
    }
}

/// Error response for a presentation layer
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<RecorderError> for ErrorResponse {
    fn from(error: RecorderError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_carries_code_and_message() {
        let response = ErrorResponse::from(RecorderError::AudioInit("no device".to_string()));
        assert_eq!(response.code, "AUDIO_INIT_ERROR");
        assert!(response.message.contains("no device"));
    }

    #[test]
    fn test_io_error_converts() {
        let err: RecorderError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
