//! Notification error types.

use thiserror::Error;

/// Failure of a single delivery attempt.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("chat API returned HTTP {0}")]
    Status(u16),

    #[error("chat API error: {0}")]
    Api(String),
}
