use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Session {session_id}: queue is full")]
    QueueFull { session_id: String },

    #[error("Session {session_id}: queue is closed")]
    QueueClosed { session_id: String },

    #[error("Session {session_id}: timed out after {waited:?}")]
    Timeout {
        session_id: String,
        waited: Duration,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session id must be non-empty")]
    InvalidSessionId,
}

pub type Result<T> = std::result::Result<T, RelayError>;
