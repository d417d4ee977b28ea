//! Error taxonomy for a sync run.
//!
//! Read-path failures (store, snapshot fetches, model bootstrap) are returned as
//! [`SyncError`] and abort the run. Write-path failures are not raised; the executor
//! records them in its [`ExecutionReport`](crate::executor::ExecutionReport).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A required local process (Anki, SiYuan) is not running.
    #[error("required process not running: {0}")]
    EnvironmentUnavailable(String),

    #[error("block store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Connection refused, timeout, undecodable body, non-200 status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The destination answered but reported an error for the action.
    #[error("destination rejected {action}: {message}")]
    Rejected { action: String, message: String },

    #[error("note model {model} is missing fields: {missing:?}")]
    SchemaDrift { model: String, missing: Vec<String> },

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The SiYuan API answered with a non-zero `code`.
    #[error("source application error: {0}")]
    Source(String),
}

impl SyncError {
    pub fn rejected(action: &str, message: impl Into<String>) -> Self {
        SyncError::Rejected {
            action: action.to_string(),
            message: message.into(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
