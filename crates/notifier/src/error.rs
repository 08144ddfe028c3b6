use thiserror::Error;

use quill_common::error::AppError;

/// Failures inside a detached notification task. These end the task and are
/// logged by the dispatcher; they never reach an HTTP caller.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Mail transport failure: {0}")]
    TransportFailure(String),

    #[error("Parent message {0} not found")]
    ParentNotFound(i64),

    #[error("Message store error: {0}")]
    Store(#[from] AppError),

    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::TransportFailure(err.to_string())
    }
}
