//! Title/summary generation client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{AiError, AiResult};
use crate::retry::with_retry;
use crate::types::{SummaryRequest, TitleSummary};

/// Seam for the summarization collaborator.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a title and summary for a transcript.
    async fn summarize(&self, transcript: &str) -> AiResult<TitleSummary>;
}

/// Configuration for the summary client.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Full endpoint URL of the summarization service
    pub url: String,
    /// Optional bearer token
    pub api_token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for transient failures
    pub max_retries: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8091/summarize".to_string(),
            api_token: None,
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }
}

impl SummaryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("SUMMARY_URL").unwrap_or(defaults.url),
            api_token: std::env::var("SUMMARY_API_TOKEN").ok(),
            timeout: Duration::from_secs(
                std::env::var("SUMMARY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            max_retries: std::env::var("SUMMARY_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

/// HTTP client for the summarization service.
pub struct SummaryClient {
    http: Client,
    config: SummaryConfig,
}

impl SummaryClient {
    pub fn new(config: SummaryConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> AiResult<Self> {
        Self::new(SummaryConfig::from_env())
    }
}

#[async_trait]
impl Summarizer for SummaryClient {
    async fn summarize(&self, transcript: &str) -> AiResult<TitleSummary> {
        debug!(chars = transcript.len(), "requesting title and summary");

        let response = with_retry(self.config.max_retries, || async {
            let mut request = self
                .http
                .post(&self.config.url)
                .json(&SummaryRequest { text: transcript });
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
        })
        .await?;

        let parsed: TitleSummary = response.json().await?;
        if parsed.title.is_empty() && parsed.summary.is_empty() {
            return Err(AiError::InvalidResponse(
                "summary service returned empty title and summary".to_string(),
            ));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SummaryClient {
        SummaryClient::new(SummaryConfig {
            url: format!("{}/summarize", server.uri()),
            api_token: None,
            timeout: Duration::from_secs(5),
            max_retries: 0,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_summarize_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/summarize"))
            .and(body_json(serde_json::json!({"text": "a transcript"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"title": "A Title", "summary": "A summary."}),
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.summarize("a transcript").await.unwrap();
        assert_eq!(result.title, "A Title");
        assert_eq!(result.summary, "A summary.");
    }

    #[tokio::test]
    async fn test_summarize_empty_response_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/summarize"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"title": "", "summary": ""})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.summarize("text").await.unwrap_err();
        assert!(matches!(err, AiError::InvalidResponse(_)));
    }
}
