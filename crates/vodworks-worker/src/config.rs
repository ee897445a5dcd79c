//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vodworks_models::VideoId;
use vodworks_storage::DEFAULT_PART_SIZE;

/// Worker configuration, read from the environment with documented defaults.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for all working directories (`WORK_ROOT`, default `.`)
    pub work_root: PathBuf,
    /// Download part size in bytes (`DOWNLOAD_PART_SIZE`, default 5 MiB)
    pub part_size: u64,
    /// Max concurrent range fetches per download (`DOWNLOAD_MAX_CONCURRENT`, default 8)
    pub max_part_fetches: usize,
    /// Max jobs processed at once (`WORKER_MAX_JOBS`, default 2)
    pub max_concurrent_jobs: usize,
    /// Max concurrent ffmpeg processes (`WORKER_MAX_FFMPEG`, default 2)
    pub max_ffmpeg_processes: usize,
    /// Per-invocation ffmpeg/ffprobe timeout (`FFMPEG_TIMEOUT` seconds, default 1800)
    pub ffmpeg_timeout: Duration,
    /// Block timeout for one bus poll (`BUS_POLL_TIMEOUT` seconds, default 5)
    pub poll_timeout: Duration,
    /// Public base URL thumbnails are served from (`PUBLIC_BASE_URL`)
    pub public_base_url: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("."),
            part_size: DEFAULT_PART_SIZE,
            max_part_fetches: 8,
            max_concurrent_jobs: 2,
            max_ffmpeg_processes: 2,
            ffmpeg_timeout: Duration::from_secs(1800),
            poll_timeout: Duration::from_secs(5),
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_root: std::env::var("WORK_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_root),
            part_size: env_parse("DOWNLOAD_PART_SIZE", defaults.part_size),
            max_part_fetches: env_parse("DOWNLOAD_MAX_CONCURRENT", defaults.max_part_fetches),
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS", defaults.max_concurrent_jobs),
            max_ffmpeg_processes: env_parse("WORKER_MAX_FFMPEG", defaults.max_ffmpeg_processes),
            ffmpeg_timeout: Duration::from_secs(env_parse("FFMPEG_TIMEOUT", 1800)),
            poll_timeout: Duration::from_secs(env_parse("BUS_POLL_TIMEOUT", 5)),
            public_base_url: std::env::var("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
        }
    }

    /// Per-job download directory. Keyed by video id so concurrently
    /// processed jobs cannot collide on the filesystem.
    pub fn processing_dir(&self, video_id: &VideoId) -> PathBuf {
        self.work_root
            .join("processing-files")
            .join(video_id.as_str())
    }

    /// Transcode output directory for one job.
    pub fn hls_dir(&self, video_id: &VideoId) -> PathBuf {
        self.work_root.join("hls-output").join(video_id.as_str())
    }

    /// Thumbnail output directory, inside the transcode output.
    pub fn thumbnails_dir(&self, video_id: &VideoId) -> PathBuf {
        self.hls_dir(video_id).join("thumbnails")
    }

    /// Fresh scratch path for a duration-fixing remux.
    pub fn remux_path(&self) -> PathBuf {
        self.work_root
            .join("remuxed")
            .join(format!("{}.webm", uuid::Uuid::new_v4()))
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
