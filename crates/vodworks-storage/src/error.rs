//! Storage error types.

use std::fmt;

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur talking to the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The metadata probe did not return a content length. Fatal to a
    /// multipart download; without a size no part plan can be computed.
    #[error("object size unknown for key '{0}'")]
    SizeUnknown(String),

    /// A range fetch failed. Downloads are all-or-nothing, so one failed
    /// part fails the whole download.
    #[error("part {index} fetch failed: {message}")]
    PartFetch { index: usize, message: String },

    /// Reassembling the parts into the output file failed.
    #[error("part merge failed: {0}")]
    Merge(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn request(err: impl fmt::Display) -> Self {
        Self::Request(err.to_string())
    }

    pub fn part_fetch(index: usize, err: impl fmt::Display) -> Self {
        Self::PartFetch {
            index,
            message: err.to_string(),
        }
    }
}
