//! Event bus client.

use std::time::Duration;

use async_trait::async_trait;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use vodworks_models::{Stage, StageResultEvent, UploadEvent};

use crate::error::{BusError, BusResult};

/// Stream carrying status events for one stage family.
pub fn stream_for(stage: Stage) -> &'static str {
    match stage {
        Stage::Transcode => "vodworks:transcode-status",
        Stage::Thumbnail => "vodworks:thumbnail-status",
        Stage::AiSummary => "vodworks:ai-summary-status",
        Stage::Transcription => "vodworks:transcription-status",
        Stage::PipelineComplete => "vodworks:pipeline-complete",
    }
}

/// Bus configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream carrying upload events
    pub upload_stream: String,
    /// Consumer group name
    pub consumer_group: String,
    /// This worker's consumer name within the group
    pub consumer_name: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            upload_stream: "vodworks:uploads".to_string(),
            consumer_group: "vodworks:workers".to_string(),
            consumer_name: format!("worker-{}", uuid::Uuid::new_v4()),
        }
    }
}

impl BusConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            upload_stream: std::env::var("BUS_UPLOAD_STREAM").unwrap_or(defaults.upload_stream),
            consumer_group: std::env::var("BUS_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            consumer_name: std::env::var("BUS_CONSUMER_NAME").unwrap_or(defaults.consumer_name),
        }
    }
}

/// Publish seam used by the pipeline; implemented by [`EventBus`] and by
/// recording fakes in tests.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &StageResultEvent) -> BusResult<()>;
}

/// An upload event pulled from the stream, paired with its message id so it
/// can be acknowledged after processing.
#[derive(Debug, Clone)]
pub struct IncomingUpload {
    pub message_id: String,
    pub event: UploadEvent,
}

/// Redis Streams bus client.
pub struct EventBus {
    client: redis::Client,
    config: BusConfig,
}

impl EventBus {
    pub fn new(config: BusConfig) -> BusResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> BusResult<Self> {
        Self::new(BusConfig::from_env())
    }

    /// Create the upload consumer group if it does not exist yet.
    pub async fn init(&self) -> BusResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.upload_stream)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!(
                group = %self.config.consumer_group,
                "created upload consumer group"
            ),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    group = %self.config.consumer_group,
                    "upload consumer group already exists"
                );
            }
            Err(e) => return Err(BusError::Redis(e)),
        }

        Ok(())
    }

    /// Block up to `timeout` waiting for the next upload event.
    ///
    /// A message whose payload cannot be parsed is acknowledged and skipped;
    /// redelivering it would poison the group forever.
    pub async fn next_upload(&self, timeout: Duration) -> BusResult<Option<IncomingUpload>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let options = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_name)
            .count(1)
            .block(timeout.as_millis() as usize);

        let reply: StreamReadReply = conn
            .xread_options(&[&self.config.upload_stream], &[">"], &options)
            .await?;

        let Some(id) = reply.keys.into_iter().flat_map(|k| k.ids).next() else {
            return Ok(None);
        };

        let message_id = id.id.clone();
        let Some(raw) = id.map.get("event") else {
            warn!(%message_id, "upload message missing 'event' field, skipping");
            self.ack(&message_id).await?;
            return Ok(None);
        };

        let payload: String = redis::from_redis_value(raw)
            .map_err(|e| BusError::malformed(&message_id, e.to_string()))?;
        match serde_json::from_str::<UploadEvent>(&payload) {
            Ok(event) => Ok(Some(IncomingUpload { message_id, event })),
            Err(e) => {
                warn!(%message_id, error = %e, "unparseable upload event, skipping");
                self.ack(&message_id).await?;
                Ok(None)
            }
        }
    }

    /// Acknowledge a processed upload message.
    pub async fn ack(&self, message_id: &str) -> BusResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.upload_stream)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.upload_stream)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!(%message_id, "acknowledged upload message");
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: &StageResultEvent) -> BusResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(event)?;
        let stream = stream_for(event.stage);

        let message_id: String = redis::cmd("XADD")
            .arg(stream)
            .arg("*")
            .arg("event")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        debug!(
            stream,
            %message_id,
            video_id = %event.video_id,
            stage = event.stage.as_str(),
            "published stage event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_per_stage_family() {
        assert_eq!(stream_for(Stage::Transcode), "vodworks:transcode-status");
        assert_eq!(stream_for(Stage::Thumbnail), "vodworks:thumbnail-status");
        assert_eq!(stream_for(Stage::AiSummary), "vodworks:ai-summary-status");
        assert_eq!(
            stream_for(Stage::Transcription),
            "vodworks:transcription-status"
        );
        assert_eq!(
            stream_for(Stage::PipelineComplete),
            "vodworks:pipeline-complete"
        );
    }

    #[test]
    fn test_bus_config_defaults() {
        let config = BusConfig::default();
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.upload_stream, "vodworks:uploads");
        assert!(config.consumer_name.starts_with("worker-"));
    }
}
