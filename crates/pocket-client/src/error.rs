//! Error types for the retrieval client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Credentials were missing, malformed or rejected (HTTP 400/401/403)
    #[error("Authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// The response body was not the expected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Any other non-success status (rate limiting, server errors)
    #[error("Request failed ({status}): {message}")]
    Status { status: u16, message: String },
}

impl ClientError {
    /// Build the error for a non-success HTTP status.
    ///
    /// The service explains failures in the `X-Error` header; `message` carries it
    /// when present.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| "no reason given".to_string());
        match status {
            400 | 401 | 403 => ClientError::Auth { status, message },
            _ => ClientError::Status { status, message },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Protocol(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}
