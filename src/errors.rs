//! Error types for the ZeptoMail transport.

use thiserror::Error;

/// Configuration is unusable (raised at setup, never per send).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConfigError(pub String);

impl ConfigError {
    pub const CODE: &'static str = "INVALID_CONFIG";
}

/// Invalid email address(es).
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct InvalidEmailError {
    pub message: String,
    pub invalid_emails: Vec<String>,
}

impl InvalidEmailError {
    pub const CODE: &'static str = "INVALID_EMAIL";
    pub fn new(message: impl Into<String>, invalid_emails: Vec<String>) -> Self {
        Self {
            message: message.into(),
            invalid_emails,
        }
    }
}

/// Network failure or attempt timeout. Always retryable.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub const CODE: &'static str = "TRANSPORT_FAILED";

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

/// Non-2xx response from the API.
#[derive(Error, Debug, Clone)]
#[error("ZeptoMail returned HTTP {status}: {body}")]
pub struct HttpStatusError {
    pub status: u16,
    pub body: String,
}

impl HttpStatusError {
    pub const CODE: &'static str = "HTTP_STATUS";

    /// 408, 429 and every 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.status, 408 | 429) || (500..=599).contains(&self.status)
    }
}

/// 2xx response whose body carries a top-level `error` key.
#[derive(Error, Debug, Clone)]
#[error("ZeptoMail rejected the request: {body}")]
pub struct ApiError {
    pub body: String,
}

impl ApiError {
    pub const CODE: &'static str = "API_ERROR";
}

/// Every way a send can fail.
#[derive(Error, Debug, Clone)]
pub enum SendError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Http(#[from] HttpStatusError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("payload could not be encoded: {0}")]
    InvalidPayload(String),
    #[error("invalid response body: {0}")]
    InvalidResponse(String),
}

impl SendError {
    pub fn code(&self) -> &'static str {
        match self {
            SendError::Config(_) => ConfigError::CODE,
            SendError::Transport(_) => TransportError::CODE,
            SendError::Http(_) => HttpStatusError::CODE,
            SendError::Api(_) => ApiError::CODE,
            SendError::InvalidPayload(_) => "INVALID_PAYLOAD",
            SendError::InvalidResponse(_) => "INVALID_RESPONSE",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SendError::Transport(_) => true,
            SendError::Http(e) => e.is_retryable(),
            _ => false,
        }
    }
}
