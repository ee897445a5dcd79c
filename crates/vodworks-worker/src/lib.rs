//! Video ingestion and pipeline-orchestration worker.
//!
//! This crate provides:
//! - Upload-event consumption with bounded job concurrency
//! - Multipart source download ahead of processing
//! - The stage orchestrator (transcode, thumbnails, transcript/summary)
//! - Per-stage status publication and graceful shutdown

pub mod ai;
pub mod config;
pub mod consumer;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod thumbnails;

pub use config::WorkerConfig;
pub use consumer::JobConsumer;
pub use error::{WorkerError, WorkerResult};
pub use pipeline::PipelineOrchestrator;
pub use source::SourceFile;
