//! Client error types

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::machine::MachineError;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with an error envelope
    #[error("API error {}: {}", .0.code, .0.message)]
    Api(AppError),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Event rejected by the local ordering machine
    #[error("Kiosk session error: {0}")]
    Machine(#[from] MachineError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Error code carried by a server-side failure
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api(e) => Some(e.code),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect(),
            ClientError::Api(e) => e.code.is_retryable(),
            _ => false,
        }
    }
}

impl From<AppError> for ClientError {
    fn from(err: AppError) -> Self {
        ClientError::Api(err)
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
