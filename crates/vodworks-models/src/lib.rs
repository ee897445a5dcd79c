//! Shared data models for the vodworks pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Upload events arriving on the bus
//! - Pipeline job descriptors
//! - Per-stage status events published back to the bus

pub mod event;
pub mod job;
pub mod video;

// Re-export common types
pub use event::{Stage, StageResultEvent, StageStatus};
pub use job::{PipelineJob, UploadEvent};
pub use video::{MediaKind, VideoId};
