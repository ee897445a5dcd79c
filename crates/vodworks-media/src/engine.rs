//! FFmpeg/FFprobe invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Media-engine seam used by the pipeline. Implemented by [`Ffmpeg`]; test
/// code substitutes fakes.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Container duration in seconds.
    async fn probe_duration(&self, file: &Path) -> MediaResult<f64>;

    /// Rewrite the container without re-encoding. Rebuilds duration
    /// metadata that live recordings often lack.
    async fn remux(&self, input: &Path, output: &Path) -> MediaResult<()>;

    /// Transcode `input` into HLS segments plus manifest under `out_dir`.
    async fn transcode_hls(&self, input: &Path, out_dir: &Path) -> MediaResult<()>;

    /// Extract one JPEG frame per timestamp into `out_dir`; returns the
    /// generated file names in timestamp order.
    async fn extract_frames(
        &self,
        input: &Path,
        timestamps: &[f64],
        out_dir: &Path,
    ) -> MediaResult<Vec<String>>;

    /// Extract the audio track as mono 16 kHz PCM WAV with loudness
    /// normalization and leading-silence removal.
    async fn extract_audio(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// CLI-backed media engine.
///
/// Binary paths are resolved once at construction and injected explicitly;
/// there is no process-global ffmpeg location.
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl Ffmpeg {
    /// Locate ffmpeg/ffprobe on PATH.
    pub fn from_path(timeout: Duration) -> MediaResult<Self> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        let ffprobe = which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;
        Ok(Self::with_binaries(ffmpeg, ffprobe, timeout))
    }

    pub fn with_binaries(
        ffmpeg: impl Into<PathBuf>,
        ffprobe: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    /// Run a command with the configured timeout, capturing output. A
    /// stalled external process must not hang its stage forever.
    async fn run(&self, program: &Path, args: &[String]) -> MediaResult<std::process::Output> {
        debug!(program = %program.display(), ?args, "running media command");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| MediaError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(MediaError::ffmpeg_failed(
                format!("{} exited with failure", program.display()),
                Some(stderr),
                output.status.code(),
            ));
        }

        Ok(output)
    }

    fn require_input(input: &Path) -> MediaResult<()> {
        if input.exists() {
            Ok(())
        } else {
            Err(MediaError::FileNotFound(input.to_path_buf()))
        }
    }
}

#[async_trait]
impl MediaEngine for Ffmpeg {
    async fn probe_duration(&self, file: &Path) -> MediaResult<f64> {
        Self::require_input(file)?;

        let args = probe_duration_args(file);
        let output = self.run(&self.ffprobe, &args).await.map_err(|e| match e {
            MediaError::FfmpegFailed {
                message, stderr, ..
            } => MediaError::ffprobe_failed(message, stderr),
            other => other,
        })?;

        let raw = String::from_utf8_lossy(&output.stdout);
        parse_duration(raw.trim())
    }

    async fn remux(&self, input: &Path, output: &Path) -> MediaResult<()> {
        Self::require_input(input)?;
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.run(&self.ffmpeg, &remux_args(input, output)).await?;
        debug!(output = %output.display(), "remux complete");
        Ok(())
    }

    async fn transcode_hls(&self, input: &Path, out_dir: &Path) -> MediaResult<()> {
        Self::require_input(input)?;
        tokio::fs::create_dir_all(out_dir).await?;

        self.run(&self.ffmpeg, &hls_args(input, out_dir)).await?;
        info!(out_dir = %out_dir.display(), "HLS transcode complete");
        Ok(())
    }

    async fn extract_frames(
        &self,
        input: &Path,
        timestamps: &[f64],
        out_dir: &Path,
    ) -> MediaResult<Vec<String>> {
        Self::require_input(input)?;
        tokio::fs::create_dir_all(out_dir).await?;

        let mut filenames = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let filename = frame_filename(i);
            let args = frame_args(input, ts, &out_dir.join(&filename));
            self.run(&self.ffmpeg, &args).await?;
            filenames.push(filename);
        }

        info!(count = filenames.len(), "extracted thumbnail frames");
        Ok(filenames)
    }

    async fn extract_audio(&self, input: &Path, output: &Path) -> MediaResult<()> {
        Self::require_input(input)?;
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.run(&self.ffmpeg, &audio_args(input, output)).await?;
        debug!(output = %output.display(), "audio extraction complete");
        Ok(())
    }
}

/// Thumbnail file name for the frame at position `index` (1-based on disk).
pub fn frame_filename(index: usize) -> String {
    format!("thumb{:04}.jpg", index + 1)
}

fn parse_duration(raw: &str) -> MediaResult<f64> {
    match raw.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => Ok(seconds),
        _ => Err(MediaError::DurationUnresolved(format!(
            "ffprobe reported '{raw}'"
        ))),
    }
}

fn probe_duration_args(file: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        file.display().to_string(),
    ]
}

fn remux_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-c".into(),
        "copy".into(),
        output.display().to_string(),
    ]
}

fn hls_args(input: &Path, out_dir: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-crf".into(),
        "23".into(),
        "-c:a".into(),
        "aac".into(),
        "-hls_time".into(),
        "6".into(),
        "-hls_playlist_type".into(),
        "vod".into(),
        "-hls_segment_filename".into(),
        out_dir.join("seg%05d.ts").display().to_string(),
        out_dir.join("index.m3u8").display().to_string(),
    ]
}

fn frame_args(input: &Path, timestamp: f64, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-ss".into(),
        format!("{timestamp}"),
        "-i".into(),
        input.display().to_string(),
        "-frames:v".into(),
        "1".into(),
        "-q:v".into(),
        "2".into(),
        output.display().to_string(),
    ]
}

fn audio_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-vn".into(),
        "-ac".into(),
        "1".into(),
        "-ar".into(),
        "16000".into(),
        "-acodec".into(),
        "pcm_s16le".into(),
        "-af".into(),
        "loudnorm,silenceremove=start_periods=1:start_threshold=-50dB:start_silence=1".into(),
        "-map_metadata".into(),
        "-1".into(),
        output.display().to_string(),
    ]
}
