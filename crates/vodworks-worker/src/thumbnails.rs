//! Thumbnail sub-phase: frame extraction and WEBVTT cue generation.

use serde_json::json;
use tracing::{error, info};

use vodworks_models::{PipelineJob, Stage, StageResultEvent};

use crate::error::WorkerResult;
use crate::pipeline::PipelineOrchestrator;
use crate::source::SourceFile;

/// Seconds of media covered by each thumbnail.
const CUE_INTERVAL: f64 = 10.0;

/// Run the whole thumbnail phase, reporting only through events.
pub(crate) async fn run_phase(
    orchestrator: &PipelineOrchestrator,
    job: &PipelineJob,
    source: SourceFile,
    duration: f64,
) {
    orchestrator
        .emit(StageResultEvent::processing(&job.video_id, Stage::Thumbnail))
        .await;

    match generate(orchestrator, job, &source, duration).await {
        Ok(count) => {
            info!(video_id = %job.video_id, count, "thumbnail phase complete");
            orchestrator
                .emit(StageResultEvent::success(
                    &job.video_id,
                    Stage::Thumbnail,
                    Some(json!({ "duration": duration })),
                ))
                .await;
        }
        Err(e) => {
            error!(video_id = %job.video_id, error = %e, "thumbnail generation failed");
            orchestrator
                .emit(StageResultEvent::failed_with_payload(
                    &job.video_id,
                    Stage::Thumbnail,
                    e.to_string(),
                    json!({ "duration": duration }),
                ))
                .await;
        }
    }
}

/// Extract frames, write the cue file and upload both.
async fn generate(
    orchestrator: &PipelineOrchestrator,
    job: &PipelineJob,
    source: &SourceFile,
    duration: f64,
) -> WorkerResult<usize> {
    let out_dir = orchestrator.config.thumbnails_dir(&job.video_id);
    tokio::fs::create_dir_all(&out_dir).await?;

    let timestamps = frame_timestamps(duration);
    let filenames = {
        let _permit = orchestrator.acquire_ffmpeg().await;
        orchestrator
            .media
            .extract_frames(source.path(), &timestamps, &out_dir)
            .await?
    };

    let base_url = format!(
        "{}/{}/thumbnails/",
        orchestrator.config.public_base_url.trim_end_matches('/'),
        job.video_id
    );
    let vtt = build_vtt(&filenames, duration, &base_url);
    tokio::fs::write(out_dir.join("thumbnails.vtt"), vtt).await?;

    let prefix = format!("{}/thumbnails", job.video_id);
    orchestrator.store.upload_directory(&out_dir, &prefix).await?;

    Ok(filenames.len())
}

/// Frame timestamps: one every 10 seconds, at least one.
pub fn frame_timestamps(duration: f64) -> Vec<f64> {
    let count = ((duration / CUE_INTERVAL).floor() as usize).max(1);
    (0..count).map(|i| i as f64 * CUE_INTERVAL).collect()
}

/// Build the WEBVTT scrubbing index: one cue per frame, each spanning the
/// 10-second window the frame was taken from, capped at the clip length.
pub fn build_vtt(filenames: &[String], duration: f64, thumbnail_base_url: &str) -> String {
    let mut lines = Vec::new();

    for (i, filename) in filenames.iter().enumerate() {
        let start = i as f64 * CUE_INTERVAL;
        let end = (start + CUE_INTERVAL).min(duration.max(start));

        lines.push(format!("{}", i + 1));
        lines.push(format!(
            "{} --> {}",
            format_cue_time(start),
            format_cue_time(end)
        ));
        lines.push(format!("{thumbnail_base_url}{filename}#xywh=0,0,427,240"));
        lines.push(String::new());
    }

    format!("WEBVTT\n\n{}", lines.join("\n"))
}

/// VTT timestamp format: HH:MM:SS.mmm.
pub fn format_cue_time(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timestamps_every_ten_seconds() {
        assert_eq!(frame_timestamps(35.0), vec![0.0, 10.0, 20.0]);
        assert_eq!(frame_timestamps(30.0), vec![0.0, 10.0, 20.0]);
        assert_eq!(frame_timestamps(9.9), vec![0.0], "minimum of one frame");
    }

    #[test]
    fn test_format_cue_time() {
        assert_eq!(format_cue_time(0.0), "00:00:00.000");
        assert_eq!(format_cue_time(30.5), "00:00:30.500");
        assert_eq!(format_cue_time(3725.25), "01:02:05.250");
    }

    #[test]
    fn test_vtt_cues_for_35_second_clip() {
        let filenames: Vec<String> = (0..3).map(|i| format!("thumb{:04}.jpg", i + 1)).collect();
        let vtt = build_vtt(&filenames, 35.0, "http://cdn/v1/thumbnails/");

        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:10.000"));
        assert!(vtt.contains("00:00:10.000 --> 00:00:20.000"));
        assert!(vtt.contains("00:00:20.000 --> 00:00:30.000"));
        assert_eq!(vtt.matches("-->").count(), 3);
        assert!(vtt.contains("http://cdn/v1/thumbnails/thumb0002.jpg#xywh=0,0,427,240"));
    }

    #[test]
    fn test_vtt_cue_never_exceeds_clip_length() {
        let filenames = vec!["thumb0001.jpg".to_string()];
        let vtt = build_vtt(&filenames, 8.25, "http://cdn/v1/thumbnails/");
        assert!(vtt.contains("00:00:00.000 --> 00:00:08.250"));
    }
}
