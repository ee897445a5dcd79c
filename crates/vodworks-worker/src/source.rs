//! Shared ownership of the downloaded source file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

/// Handle to the local source file, shared between the orchestrator and the
/// detached thumbnail task.
///
/// The file is deleted when the last handle drops, which is exactly the
/// file-lifetime policy the pipeline needs: the source survives until both
/// the thumbnail and AI sub-phases have completed or been skipped, on
/// success and failure paths alike.
#[derive(Clone)]
pub struct SourceFile {
    inner: Arc<SourceInner>,
}

struct SourceInner {
    path: PathBuf,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(SourceInner { path: path.into() }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

impl Drop for SourceInner {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "deleted source file");
                // The per-job directory is empty once the source is gone.
                if let Some(parent) = self.path.parent() {
                    std::fs::remove_dir(parent).ok();
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to delete source file");
            }
        }
    }
}
