//! Upload events and pipeline job descriptors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::video::{MediaKind, VideoId};

/// Message announcing a freshly uploaded object, consumed from the bus.
///
/// The wire format keeps the upload service's camelCase field names. All
/// flags are optional on the wire; defaults are `transcode = true`,
/// `ai_feature = false`, `kind = VOD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadEvent {
    /// Object key of the uploaded source file
    #[serde(rename = "s3Key")]
    pub s3_key: String,

    /// Video this upload belongs to
    #[serde(rename = "videoId")]
    pub video_id: VideoId,

    /// Whether the transcript/summary phase should run
    #[serde(rename = "aiFeature", default)]
    pub ai_feature: bool,

    /// Whether the transcode stage should run
    #[serde(default = "default_transcode")]
    pub transcode: bool,

    /// Origin of the recording
    #[serde(rename = "type", default)]
    pub kind: MediaKind,
}

fn default_transcode() -> bool {
    true
}

/// One unit of pipeline work, built once the source file is local.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub video_id: VideoId,
    pub source_key: String,
    /// Local copy of the source object. Only valid after the multipart
    /// download has completed.
    pub local_path: PathBuf,
    pub kind: MediaKind,
    pub transcode_enabled: bool,
    pub ai_feature_enabled: bool,
}

impl PipelineJob {
    pub fn from_event(event: &UploadEvent, local_path: impl Into<PathBuf>) -> Self {
        Self {
            video_id: event.video_id.clone(),
            source_key: event.s3_key.clone(),
            local_path: local_path.into(),
            kind: event.kind,
            transcode_enabled: event.transcode,
            ai_feature_enabled: event.ai_feature,
        }
    }
}
