//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("storage error: {0}")]
    Storage(#[from] vodworks_storage::StorageError),

    #[error("media error: {0}")]
    Media(#[from] vodworks_media::MediaError),

    #[error("AI service error: {0}")]
    Ai(#[from] vodworks_ai_client::AiError),

    #[error("bus error: {0}")]
    Bus(#[from] vodworks_bus::BusError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
