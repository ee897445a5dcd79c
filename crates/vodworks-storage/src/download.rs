//! Concurrent range-based object downloader.
//!
//! A large object is fetched as many independent byte-range parts, each
//! written to its own temporary file, then reassembled by appending the
//! parts in strict index order. Range fetches complete in arbitrary order;
//! the ordered merge is what makes the output byte-identical to a
//! single-stream download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::client::RangeFetch;
use crate::error::{StorageError, StorageResult};

/// Default part size: 5 MiB.
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// One contiguous byte range of the remote object. `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

/// Compute part boundaries for an object of `total_size` bytes.
///
/// Every byte offset in `[0, total_size)` belongs to exactly one part, and
/// the last part ends at `total_size - 1` regardless of the nominal part
/// size, so the final range never over-reads.
pub fn plan_parts(total_size: u64, part_size: u64) -> Vec<Part> {
    assert!(part_size > 0, "part size must be positive");

    let count = total_size.div_ceil(part_size) as usize;
    (0..count)
        .map(|index| {
            let start = index as u64 * part_size;
            let end = (start + part_size - 1).min(total_size - 1);
            Part { index, start, end }
        })
        .collect()
}

/// Downloads one object as concurrent range fetches and reassembles it.
#[derive(Clone)]
pub struct MultipartDownloader {
    store: Arc<dyn RangeFetch>,
    part_size: u64,
    max_concurrent: usize,
}

impl MultipartDownloader {
    /// `max_concurrent` caps the fetch fan-out; very large objects would
    /// otherwise open one connection per part.
    pub fn new(store: Arc<dyn RangeFetch>, part_size: u64, max_concurrent: usize) -> Self {
        assert!(part_size > 0, "part size must be positive");
        assert!(max_concurrent > 0, "fetch concurrency must be positive");

        Self {
            store,
            part_size,
            max_concurrent,
        }
    }

    /// Download `key` to `output_path`.
    ///
    /// All-or-nothing: if any part fetch fails the download fails, the
    /// scratch directory is removed, and no output file becomes visible.
    pub async fn download(&self, key: &str, output_path: &Path) -> StorageResult<PathBuf> {
        let total_size = self.store.head_size(key).await?;
        let parts = plan_parts(total_size, self.part_size);
        info!(
            key,
            total_size,
            part_count = parts.len(),
            "starting multipart download"
        );

        let parent = output_path
            .parent()
            .ok_or_else(|| StorageError::Merge("output path has no parent".to_string()))?;
        let parts_dir = parent.join("parts");
        tokio::fs::create_dir_all(&parts_dir).await?;

        let result = self.fetch_all(key, &parts, &parts_dir).await;
        let result = match result {
            Ok(part_files) => merge_parts(&part_files, output_path)
                .await
                .map_err(|e| StorageError::Merge(e.to_string())),
            Err(e) => Err(e),
        };

        // Scratch is removed on both paths; on failure this also drops any
        // completed part files.
        if let Err(e) = tokio::fs::remove_dir_all(&parts_dir).await {
            warn!(error = %e, "failed to remove parts directory");
        }
        if result.is_err() {
            tokio::fs::remove_file(output_path).await.ok();
            if let Ok(staging) = staging_path(output_path) {
                tokio::fs::remove_file(staging).await.ok();
            }
        }

        result?;
        info!(key, path = %output_path.display(), "multipart download complete");
        Ok(output_path.to_path_buf())
    }

    /// Fetch every part concurrently, bounded by the semaphore. Returns the
    /// part file paths in index order.
    async fn fetch_all(
        &self,
        key: &str,
        parts: &[Part],
        parts_dir: &Path,
    ) -> StorageResult<Vec<PathBuf>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        let mut part_files = Vec::with_capacity(parts.len());
        for part in parts {
            let path = parts_dir.join(format!("part-{:05}", part.index));
            part_files.push(path.clone());

            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            let key = key.to_string();
            let part = *part;
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| StorageError::part_fetch(part.index, e))?;
                debug!(index = part.index, start = part.start, end = part.end, "fetching part");
                store
                    .download_range(&key, part.start, part.end, &path)
                    .await
                    .map_err(|e| StorageError::part_fetch(part.index, e))
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => Err(StorageError::Request(e.to_string())),
            };
            if let Err(e) = outcome {
                if first_error.is_none() {
                    warn!(error = %e, "part fetch failed, aborting remaining fetches");
                    first_error = Some(e);
                    tasks.abort_all();
                }
            }
        }

        match first_error {
            None => Ok(part_files),
            Some(e) => Err(e),
        }
    }
}

/// Append `part_files` in order into `output`, deleting each part file as
/// soon as it has been fully appended.
///
/// The merge is staged under a `.partial` name and renamed into place after
/// the final flush, so callers never observe a half-written output file.
pub async fn merge_parts(part_files: &[PathBuf], output: &Path) -> std::io::Result<()> {
    let staging = staging_path(output)?;
    let mut out = tokio::fs::File::create(&staging).await?;

    for part in part_files {
        let mut file = tokio::fs::File::open(part).await?;
        tokio::io::copy(&mut file, &mut out).await?;
        tokio::fs::remove_file(part).await?;
    }

    out.flush().await?;
    out.sync_all().await?;
    drop(out);

    tokio::fs::rename(&staging, output).await
}

fn staging_path(output: &Path) -> std::io::Result<PathBuf> {
    let name = output.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "output path has no file name")
    })?;
    let mut staged = name.to_os_string();
    staged.push(".partial");
    Ok(output.with_file_name(staged))
}
