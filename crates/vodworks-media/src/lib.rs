//! FFmpeg CLI wrapper.
//!
//! This crate provides:
//! - Duration probing via ffprobe
//! - Remuxing (container rewrite, fixes broken duration metadata)
//! - HLS transcoding
//! - Frame extraction for thumbnail sprites
//! - Audio normalization for speech-to-text input

pub mod engine;
pub mod error;

pub use engine::{Ffmpeg, MediaEngine};
pub use error::{MediaError, MediaResult};
