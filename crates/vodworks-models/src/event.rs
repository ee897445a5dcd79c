//! Stage lifecycle events published to the bus.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::video::VideoId;

/// One phase of the processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Transcode,
    Thumbnail,
    AiSummary,
    Transcription,
    PipelineComplete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transcode => "TRANSCODE",
            Stage::Thumbnail => "THUMBNAIL",
            Stage::AiSummary => "AI_SUMMARY",
            Stage::Transcription => "TRANSCRIPTION",
            Stage::PipelineComplete => "PIPELINE_COMPLETE",
        }
    }
}

/// Lifecycle position of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Processing,
    Success,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Processing => "PROCESSING",
            StageStatus::Success => "SUCCESS",
            StageStatus::Failed => "FAILED",
        }
    }
}

/// A published status transition for one stage of one job.
///
/// Immutable once constructed; the constructors enforce that `error` is
/// present exactly when `status` is FAILED. For a given stage, PROCESSING is
/// always published before any terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResultEvent {
    #[serde(rename = "videoId")]
    pub video_id: VideoId,
    pub stage: Stage,
    pub status: StageStatus,
    /// Stage-specific payload, present on SUCCESS events that carry one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Human-readable failure message, present iff status is FAILED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageResultEvent {
    /// A stage has started.
    pub fn processing(video_id: &VideoId, stage: Stage) -> Self {
        Self {
            video_id: video_id.clone(),
            stage,
            status: StageStatus::Processing,
            payload: None,
            error: None,
        }
    }

    /// A stage finished successfully.
    pub fn success(video_id: &VideoId, stage: Stage, payload: Option<Value>) -> Self {
        Self {
            video_id: video_id.clone(),
            stage,
            status: StageStatus::Success,
            payload,
            error: None,
        }
    }

    /// A stage failed; the message is forwarded verbatim to consumers.
    pub fn failed(video_id: &VideoId, stage: Stage, error: impl Into<String>) -> Self {
        Self {
            video_id: video_id.clone(),
            stage,
            status: StageStatus::Failed,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// A stage failed, with a partial payload worth reporting anyway.
    pub fn failed_with_payload(
        video_id: &VideoId,
        stage: Stage,
        error: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            video_id: video_id.clone(),
            stage,
            status: StageStatus::Failed,
            payload: Some(payload),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_processing_has_no_error() {
        let ev = StageResultEvent::processing(&VideoId::new("v1"), Stage::Transcode);
        assert_eq!(ev.status, StageStatus::Processing);
        assert!(ev.error.is_none());
        assert!(ev.payload.is_none());
    }

    #[test]
    fn test_failed_carries_error() {
        let ev = StageResultEvent::failed(&VideoId::new("v1"), Stage::Transcode, "boom");
        assert_eq!(ev.status, StageStatus::Failed);
        assert_eq!(ev.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_success_serialization_omits_absent_fields() {
        let ev = StageResultEvent::success(
            &VideoId::new("v1"),
            Stage::Thumbnail,
            Some(json!({"duration": 35.0})),
        );
        let s = serde_json::to_string(&ev).unwrap();
        assert!(s.contains("\"stage\":\"THUMBNAIL\""));
        assert!(s.contains("\"status\":\"SUCCESS\""));
        assert!(s.contains("\"duration\":35.0"));
        assert!(!s.contains("\"error\""));
    }

    #[test]
    fn test_stage_wire_names() {
        assert_eq!(
            serde_json::to_string(&Stage::AiSummary).unwrap(),
            "\"AI_SUMMARY\""
        );
        assert_eq!(
            serde_json::to_string(&Stage::PipelineComplete).unwrap(),
            "\"PIPELINE_COMPLETE\""
        );
    }
}
