//! Speech-to-text client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{AiError, AiResult};
use crate::retry::with_retry;
use crate::types::TranscriptionResponse;

/// Seam for the speech-to-text collaborator.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw audio bytes. `content_type` describes the container,
    /// e.g. `audio/wav`.
    async fn transcribe(&self, audio: Vec<u8>, content_type: &str) -> AiResult<String>;
}

/// Configuration for the transcription client.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Full endpoint URL of the transcription service
    pub url: String,
    /// Optional bearer token
    pub api_token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for transient failures
    pub max_retries: u32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8090/transcribe".to_string(),
            api_token: None,
            timeout: Duration::from_secs(300),
            max_retries: 2,
        }
    }
}

impl TranscriptionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("TRANSCRIPTION_URL").unwrap_or(defaults.url),
            api_token: std::env::var("TRANSCRIPTION_API_TOKEN").ok(),
            timeout: Duration::from_secs(
                std::env::var("TRANSCRIPTION_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            max_retries: std::env::var("TRANSCRIPTION_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

/// HTTP client for the speech-to-text service.
pub struct TranscriptionClient {
    http: Client,
    config: TranscriptionConfig,
}

impl TranscriptionClient {
    pub fn new(config: TranscriptionConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> AiResult<Self> {
        Self::new(TranscriptionConfig::from_env())
    }
}

#[async_trait]
impl Transcriber for TranscriptionClient {
    async fn transcribe(&self, audio: Vec<u8>, content_type: &str) -> AiResult<String> {
        debug!(
            bytes = audio.len(),
            content_type, "sending audio for transcription"
        );

        let response = with_retry(self.config.max_retries, || {
            let audio = audio.clone();
            async move {
                let mut request = self
                    .http
                    .post(&self.config.url)
                    .header("Content-Type", content_type)
                    .body(audio);
                if let Some(ref token) = self.config.api_token {
                    request = request.bearer_auth(token);
                }

                let response = request.send().await.map_err(AiError::Network)?;
                let status = response.status();
                if status.is_server_error() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AiError::ServiceUnavailable(format!("{status}: {body}")));
                }
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AiError::RequestFailed(format!("{status}: {body}")));
                }
                Ok(response)
            }
        })
        .await?;

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text)
    }
}

/// Content type for an audio file the transcription service accepts as-is,
/// or `None` when the source must first be normalized to WAV. Video
/// containers (webm, mp4) always go through normalization.
pub fn passthrough_content_type(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") => Some("audio/wav"),
        Some("mp3") => Some("audio/mpeg"),
        _ => None,
    }
}
