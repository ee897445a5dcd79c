//! S3-compatible object store access.
//!
//! This crate provides:
//! - A thin client over aws-sdk-s3 (metadata probe, ranged reads, uploads)
//! - A concurrent multipart downloader that reassembles a large object
//!   from parallel range fetches

pub mod client;
pub mod download;
pub mod error;

pub use client::{ArtifactStore, ObjectStore, RangeFetch};
pub use download::{plan_parts, MultipartDownloader, Part, DEFAULT_PART_SIZE};
pub use error::{StorageError, StorageResult};
