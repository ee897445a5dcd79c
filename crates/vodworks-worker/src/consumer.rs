//! Upload-event consumer loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

use vodworks_bus::{EventBus, IncomingUpload};
use vodworks_models::PipelineJob;
use vodworks_storage::MultipartDownloader;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::pipeline::PipelineOrchestrator;

/// Consumes upload events and runs the pipeline for each, with bounded job
/// concurrency and graceful shutdown.
pub struct JobConsumer {
    config: WorkerConfig,
    bus: Arc<EventBus>,
    downloader: MultipartDownloader,
    orchestrator: PipelineOrchestrator,
    job_slots: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobConsumer {
    pub fn new(
        config: WorkerConfig,
        bus: Arc<EventBus>,
        downloader: MultipartDownloader,
        orchestrator: PipelineOrchestrator,
    ) -> Self {
        let job_slots = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            bus,
            downloader,
            orchestrator,
            job_slots,
            shutdown,
        }
    }

    /// Run the consume loop until shutdown is signalled.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            max_jobs = self.config.max_concurrent_jobs,
            "starting job consumer"
        );
        self.bus.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping consumer");
                        break;
                    }
                }
                incoming = self.bus.next_upload(self.config.poll_timeout) => {
                    match incoming {
                        Ok(Some(upload)) => self.dispatch(upload).await,
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "failed to read from bus, backing off");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }

        // Let in-flight jobs drain before returning.
        let _all = self
            .job_slots
            .acquire_many(self.config.max_concurrent_jobs as u32)
            .await;
        info!("job consumer stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Spawn the processing task for one upload, respecting the job cap.
    async fn dispatch(&self, upload: IncomingUpload) {
        let Ok(permit) = Arc::clone(&self.job_slots).acquire_owned().await else {
            return;
        };

        let config = self.config.clone();
        let bus = Arc::clone(&self.bus);
        let downloader = self.downloader.clone();
        let orchestrator = self.orchestrator.clone();

        tokio::spawn(async move {
            let message_id = upload.message_id.clone();
            let video_id = upload.event.video_id.clone();

            match process_upload(&config, &downloader, &orchestrator, upload).await {
                Ok(()) => {
                    counter!("vodworks_jobs_total", "outcome" => "completed").increment(1);
                }
                Err(e) => {
                    // A failed download must not lead to processing a
                    // partial file; the job ends here.
                    counter!("vodworks_jobs_total", "outcome" => "failed").increment(1);
                    error!(%video_id, error = %e, "job failed before processing");
                }
            }

            if let Err(e) = bus.ack(&message_id).await {
                warn!(%message_id, error = %e, "failed to acknowledge upload message");
            }
            drop(permit);
        });
    }
}

/// Download the source object and run the pipeline against it.
async fn process_upload(
    config: &WorkerConfig,
    downloader: &MultipartDownloader,
    orchestrator: &PipelineOrchestrator,
    upload: IncomingUpload,
) -> WorkerResult<()> {
    let event = upload.event;
    info!(
        video_id = %event.video_id,
        key = %event.s3_key,
        "received upload event"
    );

    let dir = config.processing_dir(&event.video_id);
    tokio::fs::create_dir_all(&dir).await?;
    let local_path = dir.join(source_file_name(&event.s3_key));

    downloader.download(&event.s3_key, &local_path).await?;

    let job = PipelineJob::from_event(&event, local_path);
    orchestrator.run(job).await;
    Ok(())
}

/// Local file name for a source object key.
fn source_file_name(key: &str) -> PathBuf {
    PathBuf::from(
        std::path::Path::new(key)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "source.bin".into()),
    )
}
