use thiserror::Error;

/// Errors produced by the hub collaborator and the device model
///
/// The supervisor treats every transient variant as a connectivity fault and
/// retries; nothing here is surfaced to the end consumer as a hard failure.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network communication error
    ///
    /// Connection refused, DNS failure, TLS handshake failure or the hub
    /// going away mid-request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The hub answered with a non-success HTTP status
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// A payload could not be decoded into the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// A partial update was applied to a record with a different id
    #[error("Update for device {actual} cannot be applied to device {expected}")]
    DeviceMismatch { expected: String, actual: String },

    /// The event stream ended unexpectedly
    #[error("Event stream closed")]
    StreamClosed,
}

impl ApiError {
    /// Whether the error is a connectivity fault that a reconnect can recover from
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Transport(_) | ApiError::Http { .. } | ApiError::StreamClosed
        )
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Parse(error.to_string())
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;
