//! AI sub-phase: transcription followed by title/summary generation.

use serde_json::json;
use tracing::{error, info, warn};

use vodworks_ai_client::passthrough_content_type;
use vodworks_models::{PipelineJob, Stage, StageResultEvent};

use crate::error::WorkerResult;
use crate::pipeline::PipelineOrchestrator;
use crate::source::SourceFile;

/// Run the AI phase. Transcription failure fails the phase; summary failure
/// only downgrades the result to transcript-only.
pub(crate) async fn run_phase(
    orchestrator: &PipelineOrchestrator,
    job: &PipelineJob,
    source: &SourceFile,
) {
    orchestrator
        .emit(StageResultEvent::processing(&job.video_id, Stage::AiSummary))
        .await;

    let transcript = match transcribe_source(orchestrator, job, source).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!(video_id = %job.video_id, "transcription produced no text");
            orchestrator
                .emit(StageResultEvent::failed(
                    &job.video_id,
                    Stage::AiSummary,
                    "transcription produced no text",
                ))
                .await;
            return;
        }
        Err(e) => {
            error!(video_id = %job.video_id, error = %e, "transcription failed");
            orchestrator
                .emit(StageResultEvent::failed(
                    &job.video_id,
                    Stage::AiSummary,
                    e.to_string(),
                ))
                .await;
            return;
        }
    };

    // The transcript is reported on its own topic regardless of how the
    // summary turns out.
    orchestrator
        .emit(StageResultEvent::success(
            &job.video_id,
            Stage::Transcription,
            Some(json!({ "transcript": transcript })),
        ))
        .await;

    match orchestrator.summarizer.summarize(&transcript).await {
        Ok(result) => {
            info!(video_id = %job.video_id, title = %result.title, "summary generated");
            orchestrator
                .emit(StageResultEvent::success(
                    &job.video_id,
                    Stage::AiSummary,
                    Some(json!({
                        "title": result.title,
                        "summary": result.summary,
                        "transcript": transcript,
                    })),
                ))
                .await;
        }
        Err(e) => {
            warn!(video_id = %job.video_id, error = %e, "summary generation failed, reporting transcript only");
            orchestrator
                .emit(StageResultEvent::success(
                    &job.video_id,
                    Stage::AiSummary,
                    Some(json!({ "transcript": transcript })),
                ))
                .await;
        }
    }
}

/// Obtain a transcript for the source file.
///
/// WAV and MP3 sources are sent as-is; everything else (video containers,
/// exotic audio) is first normalized to mono 16 kHz PCM.
async fn transcribe_source(
    orchestrator: &PipelineOrchestrator,
    job: &PipelineJob,
    source: &SourceFile,
) -> WorkerResult<String> {
    let path = source.path();

    if let Some(content_type) = passthrough_content_type(path) {
        let audio = tokio::fs::read(path).await?;
        return Ok(orchestrator
            .transcriber
            .transcribe(audio, content_type)
            .await?);
    }

    let wav_path = orchestrator
        .config
        .processing_dir(&job.video_id)
        .join("audio.wav");
    {
        let _permit = orchestrator.acquire_ffmpeg().await;
        orchestrator.media.extract_audio(path, &wav_path).await?;
    }

    let audio = tokio::fs::read(&wav_path).await;
    tokio::fs::remove_file(&wav_path).await.ok();

    Ok(orchestrator
        .transcriber
        .transcribe(audio?, "audio/wav")
        .await?)
}
