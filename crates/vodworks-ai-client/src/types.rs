//! Request/response types for the AI services.

use serde::{Deserialize, Serialize};

/// Transcription service response.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub text: String,
}

/// Summarization request body.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRequest<'a> {
    pub text: &'a str,
}

/// Title and summary generated for one transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleSummary {
    pub title: String,
    pub summary: String,
}
