//! HTTP clients for the AI services.
//!
//! Two external collaborators sit behind this crate: a speech-to-text
//! service that accepts raw audio bytes, and a summarization service that
//! turns a transcript into a title and summary. Both clients use bounded
//! exponential-backoff retry for transient failures.

pub mod error;
mod retry;
pub mod summary;
pub mod transcription;
pub mod types;

pub use error::{AiError, AiResult};
pub use summary::{Summarizer, SummaryClient, SummaryConfig};
pub use transcription::{
    passthrough_content_type, Transcriber, TranscriptionClient, TranscriptionConfig,
};
pub use types::TitleSummary;
