//! Error types for dirigera-state

use thiserror::Error;

/// Errors that can occur while configuring or starting the hub supervisor
///
/// Connectivity faults never appear here: the supervisor recovers from them
/// by reconnecting, and only availability changes are visible to consumers.
#[derive(Debug, Error)]
pub enum HubError {
    /// A background thread (worker or callback executor) could not be spawned
    #[error("Failed to spawn hub thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// `start()` was called after `stop()`; a stopped hub cannot be reused
    #[error("Hub has been stopped; create a new one")]
    Stopped,

    /// Configuration value could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The tracing subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Result type for dirigera-state operations
pub type Result<T> = std::result::Result<T, HubError>;
