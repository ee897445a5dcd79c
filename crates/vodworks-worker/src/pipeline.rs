//! Stage orchestration.
//!
//! One pipeline run sequences:
//! 1. transcode (blocking; failure halts the whole pipeline)
//! 2. thumbnails (detached, fire-and-forget) in parallel with
//! 3. transcript/summary (awaited, failure reported but non-fatal)
//!
//! Every stage error is caught at the stage boundary and converted into a
//! FAILED event; nothing here crashes the worker.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{error, info, warn};

use vodworks_ai_client::{Summarizer, Transcriber};
use vodworks_bus::EventPublisher;
use vodworks_media::MediaEngine;
use vodworks_models::{MediaKind, PipelineJob, Stage, StageResultEvent};
use vodworks_storage::ArtifactStore;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::source::SourceFile;
use crate::{ai, thumbnails};

/// Drives one job through the pipeline stages.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    pub(crate) config: WorkerConfig,
    pub(crate) media: Arc<dyn MediaEngine>,
    pub(crate) store: Arc<dyn ArtifactStore>,
    pub(crate) transcriber: Arc<dyn Transcriber>,
    pub(crate) summarizer: Arc<dyn Summarizer>,
    pub(crate) publisher: Arc<dyn EventPublisher>,
    ffmpeg_slots: Arc<Semaphore>,
}

impl PipelineOrchestrator {
    pub fn new(
        config: WorkerConfig,
        media: Arc<dyn MediaEngine>,
        store: Arc<dyn ArtifactStore>,
        transcriber: Arc<dyn Transcriber>,
        summarizer: Arc<dyn Summarizer>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let ffmpeg_slots = Arc::new(Semaphore::new(config.max_ffmpeg_processes));
        Self {
            config,
            media,
            store,
            transcriber,
            summarizer,
            publisher,
            ffmpeg_slots,
        }
    }

    /// Run all stages for one job.
    ///
    /// Takes ownership of the downloaded source file; it is deleted once the
    /// last sub-phase holding it finishes.
    pub async fn run(&self, job: PipelineJob) {
        info!(video_id = %job.video_id, kind = job.kind.as_str(), "starting pipeline");
        let source = SourceFile::new(job.local_path.clone());

        if job.transcode_enabled {
            self.emit(StageResultEvent::processing(&job.video_id, Stage::Transcode))
                .await;
            if let Err(e) = self.transcode(&job, &source).await {
                error!(video_id = %job.video_id, error = %e, "transcode failed, halting pipeline");
                self.emit(StageResultEvent::failed(
                    &job.video_id,
                    Stage::Transcode,
                    e.to_string(),
                ))
                .await;
                // Without playable output the derived artifacts have no
                // value: no thumbnail or AI stage runs.
                return;
            }
            self.emit(StageResultEvent::success(
                &job.video_id,
                Stage::Transcode,
                None,
            ))
            .await;
        }

        // Thumbnails are fire-and-forget: the detached task owns its error
        // boundary and reports only through its own events.
        match self.resolve_duration(&job, &source).await {
            Ok(duration) => {
                let orchestrator = self.clone();
                let job = job.clone();
                let source = source.clone();
                tokio::spawn(async move {
                    thumbnails::run_phase(&orchestrator, &job, source, duration).await;
                });
            }
            Err(e) => {
                info!(video_id = %job.video_id, error = %e, "duration unresolved, skipping thumbnails");
            }
        }

        if job.ai_feature_enabled {
            ai::run_phase(self, &job, &source).await;
        }

        self.emit(StageResultEvent::success(
            &job.video_id,
            Stage::PipelineComplete,
            None,
        ))
        .await;
        info!(video_id = %job.video_id, "pipeline complete");
    }

    /// Transcode to HLS and upload the output directory.
    async fn transcode(&self, job: &PipelineJob, source: &SourceFile) -> WorkerResult<()> {
        let out_dir = self.config.hls_dir(&job.video_id);
        {
            let _permit = self.acquire_ffmpeg().await;
            self.media.transcode_hls(source.path(), &out_dir).await?;
        }
        self.store
            .upload_directory(&out_dir, job.video_id.as_str())
            .await?;
        Ok(())
    }

    /// Resolve the media duration the thumbnail phase depends on.
    ///
    /// Live recordings are remuxed first because their container duration
    /// metadata is often absent or wrong; VOD uploads are probed directly.
    async fn resolve_duration(&self, job: &PipelineJob, source: &SourceFile) -> WorkerResult<f64> {
        match job.kind {
            MediaKind::Vod => Ok(self.media.probe_duration(source.path()).await?),
            MediaKind::Live => {
                let remuxed = self.config.remux_path();
                let duration = {
                    let _permit = self.acquire_ffmpeg().await;
                    self.media.remux(source.path(), &remuxed).await?;
                    self.media.probe_duration(&remuxed).await
                };
                tokio::fs::remove_file(&remuxed).await.ok();
                Ok(duration?)
            }
        }
    }

    pub(crate) async fn acquire_ffmpeg(&self) -> SemaphorePermit<'_> {
        // The semaphore lives as long as self and is never closed.
        self.ffmpeg_slots
            .acquire()
            .await
            .expect("ffmpeg semaphore closed")
    }

    /// Publish a stage event. Publication is fire-and-forget: a bus failure
    /// is logged, never propagated into the pipeline.
    pub(crate) async fn emit(&self, event: StageResultEvent) {
        counter!(
            "vodworks_stage_events_total",
            "stage" => event.stage.as_str(),
            "status" => event.status.as_str()
        )
        .increment(1);

        if let Err(e) = self.publisher.publish(&event).await {
            warn!(
                video_id = %event.video_id,
                stage = event.stage.as_str(),
                error = %e,
                "failed to publish stage event"
            );
        }
    }
}
