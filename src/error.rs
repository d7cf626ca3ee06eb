//! Error types.
//!
//! One enum per concern: [`DbError`] for store and transport failures,
//! [`TaskError`] for failures raised by task callbacks, and [`RunError`]
//! for whatever aborts a migration run.

use thiserror::Error;

/// Errors raised while talking to the document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    /// The request could not be delivered or the connection failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The store answered with a non-success status.
    #[error("HTTP {status}: {error} ({reason})")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error kind from the response body.
        error: String,
        /// Reason from the response body.
        reason: String,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Page size must be at least one.
    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    /// The database URL is malformed.
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for DbError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Errors raised by task callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task rejected or failed on a document.
    #[error("Task '{task}' failed: {message}")]
    Failed {
        /// Name of the failing task.
        task: String,
        /// What went wrong.
        message: String,
    },

    /// A value could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Failed`].
    pub fn failed(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            task: task.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Errors that abort a migration run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// Page fetch or bulk write failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// A task callback failed.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// A task name was requested that is not registered.
    #[error("Unknown task: {0}")]
    UnknownTask(String),
}
