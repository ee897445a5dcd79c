//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{AiError, AiResult};

/// Run `operation` up to `max_retries + 1` times, backing off 500ms, 1s,
/// 2s, ... between attempts. Only retryable errors are retried.
pub(crate) async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> AiResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AiResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                warn!(
                    attempt = attempt + 1,
                    ?delay,
                    error = %e,
                    "AI request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| AiError::RequestFailed("unknown error".to_string())))
}
