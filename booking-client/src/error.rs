//! Errors from the bookings API and the messaging API

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connect, timeout or body read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// 400 / 422, or a request we refused to send
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },

    /// 2xx body whose envelope carries a non-zero code
    #[error("API error {}: {}", .0.code, .0.message)]
    Api(AppError),

    /// Messaging API answered with `error != 0`
    #[error("Rejected by messaging API ({code}): {message}")]
    Rejected { code: i64, message: String },

    /// No template id for the notification kind
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// The outbox keeps retrying these
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            Self::Api(e) => e.code.is_retryable(),
            _ => false,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Http(e) if e.is_timeout() => ErrorCode::TimeoutError,
            Self::Http(_) | Self::Server { .. } => ErrorCode::NetworkError,
            Self::InvalidResponse(_) | Self::Serialization(_) => ErrorCode::InvalidRequest,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::Api(e) => e.code,
            Self::Rejected { .. } => ErrorCode::NotificationRejected,
            Self::Config(_) => ErrorCode::TemplateMissing,
        }
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api(e) => e,
            other => AppError::with_message(other.error_code(), other.to_string()),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
