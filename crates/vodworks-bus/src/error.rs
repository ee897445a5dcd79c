//! Bus error types.

use thiserror::Error;

pub type BusResult<T> = Result<T, BusError>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed message {id}: {message}")]
    Malformed { id: String, message: String },
}

impl BusError {
    pub fn malformed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            id: id.into(),
            message: message.into(),
        }
    }
}
