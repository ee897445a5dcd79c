//! Worker entry point.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vodworks_ai_client::{SummaryClient, TranscriptionClient};
use vodworks_bus::EventBus;
use vodworks_media::Ffmpeg;
use vodworks_storage::{MultipartDownloader, ObjectStore};
use vodworks_worker::{JobConsumer, PipelineOrchestrator, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install()
        .context("failed to install metrics exporter")?;

    let config = WorkerConfig::from_env();
    info!(work_root = %config.work_root.display(), "worker starting");

    let store = Arc::new(
        ObjectStore::from_env()
            .await
            .context("failed to build object store client")?,
    );
    let media = Arc::new(Ffmpeg::from_path(config.ffmpeg_timeout).context("ffmpeg unavailable")?);
    let transcriber =
        Arc::new(TranscriptionClient::from_env().context("failed to build transcription client")?);
    let summarizer = Arc::new(SummaryClient::from_env().context("failed to build summary client")?);
    let bus = Arc::new(EventBus::from_env().context("failed to build event bus")?);

    let downloader = MultipartDownloader::new(
        Arc::clone(&store) as Arc<dyn vodworks_storage::RangeFetch>,
        config.part_size,
        config.max_part_fetches,
    );
    let orchestrator = PipelineOrchestrator::new(
        config.clone(),
        media,
        store,
        transcriber,
        summarizer,
        Arc::clone(&bus) as Arc<dyn vodworks_bus::EventPublisher>,
    );

    let consumer = Arc::new(JobConsumer::new(config, bus, downloader, orchestrator));

    let runner = Arc::clone(&consumer);
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    consumer.shutdown();

    handle.await.context("consumer task panicked")??;
    Ok(())
}
