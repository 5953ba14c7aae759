//! Error types for the Automator engine.

use thiserror::Error;

/// Errors that can occur anywhere in the engine.
#[derive(Error, Debug)]
pub enum AutomatorError {
    /// An alarm fired for a task that no longer exists in storage.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// A reminder was scheduled with an out-of-range parameter.
    #[error("invalid schedule parameter: {0}")]
    InvalidScheduleParameter(String),

    /// The persistent key-value storage failed a read or write.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The chat-completions endpoint rejected or failed a request.
    #[error("completion request failed: {0}")]
    UpstreamCompletion(String),

    /// Configuration loading or saving error.
    #[error("config error: {0}")]
    Config(String),

    /// Host protocol envelope or payload error.
    #[error("host protocol error: {0}")]
    Protocol(String),

    /// Internal channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// Notification or clipboard dispatch error.
    #[error("notification error: {0}")]
    Notification(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type used throughout the crate.
pub type Result<T> = std::result::Result<T, AutomatorError>;
