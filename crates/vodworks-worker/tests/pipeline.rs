//! Orchestrator behavior tests.
//!
//! The external collaborators (media engine, object store, AI services,
//! event bus) are replaced with fakes; the assertions are about which stage
//! events get published, and in what order.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use vodworks_ai_client::{AiError, AiResult, Summarizer, TitleSummary, Transcriber};
use vodworks_bus::{BusResult, EventPublisher};
use vodworks_media::{MediaEngine, MediaError, MediaResult};
use vodworks_models::{MediaKind, PipelineJob, Stage, StageResultEvent, StageStatus, VideoId};
use vodworks_storage::{ArtifactStore, StorageResult};
use vodworks_worker::{PipelineOrchestrator, WorkerConfig};

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<StageResultEvent>>,
}

impl RecordingPublisher {
    fn snapshot(&self) -> Vec<StageResultEvent> {
        self.events.lock().unwrap().clone()
    }

    fn statuses(&self) -> Vec<(Stage, StageStatus)> {
        self.snapshot().iter().map(|e| (e.stage, e.status)).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &StageResultEvent) -> BusResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct FakeMedia {
    duration: Option<f64>,
    fail_transcode: bool,
    fail_frames: bool,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl FakeMedia {
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn called(&self, call: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| *c == call)
    }
}

#[async_trait]
impl MediaEngine for FakeMedia {
    async fn probe_duration(&self, _file: &std::path::Path) -> MediaResult<f64> {
        self.record("probe_duration");
        self.duration
            .ok_or_else(|| MediaError::DurationUnresolved("fake probe".to_string()))
    }

    async fn remux(&self, _input: &std::path::Path, output: &std::path::Path) -> MediaResult<()> {
        self.record("remux");
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, b"remuxed").await?;
        Ok(())
    }

    async fn transcode_hls(
        &self,
        _input: &std::path::Path,
        out_dir: &std::path::Path,
    ) -> MediaResult<()> {
        self.record("transcode_hls");
        if self.fail_transcode {
            return Err(MediaError::ffmpeg_failed("fake transcode", None, Some(1)));
        }
        tokio::fs::create_dir_all(out_dir).await?;
        tokio::fs::write(out_dir.join("index.m3u8"), b"#EXTM3U\n").await?;
        Ok(())
    }

    async fn extract_frames(
        &self,
        _input: &std::path::Path,
        timestamps: &[f64],
        _out_dir: &std::path::Path,
    ) -> MediaResult<Vec<String>> {
        self.record("extract_frames");
        if self.fail_frames {
            return Err(MediaError::ffmpeg_failed("fake frames", None, Some(1)));
        }
        Ok((0..timestamps.len())
            .map(|i| format!("thumb{:04}.jpg", i + 1))
            .collect())
    }

    async fn extract_audio(
        &self,
        _input: &std::path::Path,
        output: &std::path::Path,
    ) -> MediaResult<()> {
        self.record("extract_audio");
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, b"RIFFfake").await?;
        Ok(())
    }
}

struct FakeStore;

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn upload_directory(
        &self,
        _local_dir: &std::path::Path,
        _prefix: &str,
    ) -> StorageResult<Vec<String>> {
        Ok(Vec::new())
    }
}

struct FakeTranscriber {
    result: Result<String, String>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>, _content_type: &str) -> AiResult<String> {
        match &self.result {
            Ok(text) => Ok(text.clone()),
            Err(msg) => Err(AiError::RequestFailed(msg.clone())),
        }
    }
}

struct FakeSummarizer {
    fail: bool,
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, _transcript: &str) -> AiResult<TitleSummary> {
        if self.fail {
            Err(AiError::RequestFailed("fake summary down".to_string()))
        } else {
            Ok(TitleSummary {
                title: "A Title".to_string(),
                summary: "A summary.".to_string(),
            })
        }
    }
}

struct Harness {
    orchestrator: PipelineOrchestrator,
    publisher: Arc<RecordingPublisher>,
    media: FakeMedia,
    source_path: PathBuf,
    _work_dir: tempfile::TempDir,
}

impl Harness {
    async fn new(
        media: FakeMedia,
        transcriber: FakeTranscriber,
        summarizer: FakeSummarizer,
    ) -> Self {
        Self::with_source(media, transcriber, summarizer, "source.wav").await
    }

    async fn with_source(
        media: FakeMedia,
        transcriber: FakeTranscriber,
        summarizer: FakeSummarizer,
        source_name: &str,
    ) -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let config = WorkerConfig {
            work_root: work_dir.path().to_path_buf(),
            ..WorkerConfig::default()
        };

        let video_id = VideoId::new("v1");
        let source_dir = config.processing_dir(&video_id);
        tokio::fs::create_dir_all(&source_dir).await.unwrap();
        let source_path = source_dir.join(source_name);
        tokio::fs::write(&source_path, b"fake audio").await.unwrap();

        let publisher = Arc::new(RecordingPublisher::default());
        let orchestrator = PipelineOrchestrator::new(
            config,
            Arc::new(media.clone()),
            Arc::new(FakeStore),
            Arc::new(transcriber),
            Arc::new(summarizer),
            Arc::clone(&publisher) as Arc<dyn EventPublisher>,
        );

        Self {
            orchestrator,
            publisher,
            media,
            source_path,
            _work_dir: work_dir,
        }
    }

    fn job(&self, kind: MediaKind, transcode: bool, ai: bool) -> PipelineJob {
        PipelineJob {
            video_id: VideoId::new("v1"),
            source_key: "uploads/source.wav".to_string(),
            local_path: self.source_path.clone(),
            kind,
            transcode_enabled: transcode,
            ai_feature_enabled: ai,
        }
    }

    /// Wait until an event matching `pred` has been published; panics after
    /// two seconds. Needed because the thumbnail phase is detached.
    async fn wait_for(&self, pred: impl Fn(&StageResultEvent) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if self.publisher.snapshot().iter().any(&pred) {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for event; got {:?}",
                self.publisher.statuses()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

fn ok_transcriber() -> FakeTranscriber {
    FakeTranscriber {
        result: Ok("hello world transcript".to_string()),
    }
}

#[tokio::test]
async fn transcode_failure_halts_pipeline() {
    let media = FakeMedia {
        duration: Some(35.0),
        fail_transcode: true,
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, ok_transcriber(), FakeSummarizer { fail: false }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, true, true))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        harness.publisher.statuses(),
        vec![
            (Stage::Transcode, StageStatus::Processing),
            (Stage::Transcode, StageStatus::Failed),
        ],
        "no thumbnail, AI or completion event may follow a transcode failure"
    );
}

#[tokio::test]
async fn thumbnail_failure_does_not_block_ai_success() {
    let media = FakeMedia {
        duration: Some(35.0),
        fail_frames: true,
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, ok_transcriber(), FakeSummarizer { fail: false }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, true, true))
        .await;
    harness
        .wait_for(|e| e.stage == Stage::Thumbnail && e.status == StageStatus::Failed)
        .await;

    let statuses = harness.publisher.statuses();
    assert!(statuses.contains(&(Stage::AiSummary, StageStatus::Success)));
    assert!(statuses.contains(&(Stage::PipelineComplete, StageStatus::Success)));
}

#[tokio::test]
async fn thumbnail_success_reports_duration() {
    let media = FakeMedia {
        duration: Some(35.0),
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, ok_transcriber(), FakeSummarizer { fail: false }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, true, false))
        .await;
    harness
        .wait_for(|e| e.stage == Stage::Thumbnail && e.status == StageStatus::Success)
        .await;

    let events = harness.publisher.snapshot();
    let success = events
        .iter()
        .find(|e| e.stage == Stage::Thumbnail && e.status == StageStatus::Success)
        .unwrap();
    assert_eq!(
        success.payload.as_ref().unwrap()["duration"].as_f64(),
        Some(35.0)
    );
}

#[tokio::test]
async fn transcription_failure_fails_ai_without_transcription_event() {
    let media = FakeMedia {
        duration: None,
        ..FakeMedia::default()
    };
    let transcriber = FakeTranscriber {
        result: Err("speech service down".to_string()),
    };
    let harness = Harness::new(media, transcriber, FakeSummarizer { fail: false }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, true, true))
        .await;

    let statuses = harness.publisher.statuses();
    assert!(statuses.contains(&(Stage::AiSummary, StageStatus::Failed)));
    assert!(
        !statuses.iter().any(|(s, _)| *s == Stage::Transcription),
        "no transcription event without a transcript"
    );
    assert!(statuses.contains(&(Stage::PipelineComplete, StageStatus::Success)));
}

#[tokio::test]
async fn summary_failure_still_reports_transcript() {
    let media = FakeMedia::default();
    let harness = Harness::new(media, ok_transcriber(), FakeSummarizer { fail: true }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, true, true))
        .await;

    let events = harness.publisher.snapshot();
    assert!(events
        .iter()
        .any(|e| e.stage == Stage::Transcription && e.status == StageStatus::Success));

    let ai_success = events
        .iter()
        .find(|e| e.stage == Stage::AiSummary && e.status == StageStatus::Success)
        .expect("AI phase must still succeed with the transcript alone");
    let payload = ai_success.payload.as_ref().unwrap();
    assert_eq!(
        payload["transcript"].as_str(),
        Some("hello world transcript")
    );
    assert!(payload.get("title").is_none());
}

#[tokio::test]
async fn unresolved_duration_skips_thumbnails_silently() {
    let media = FakeMedia {
        duration: None,
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, ok_transcriber(), FakeSummarizer { fail: false }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, true, false))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let statuses = harness.publisher.statuses();
    assert!(!statuses.iter().any(|(s, _)| *s == Stage::Thumbnail));
    assert!(statuses.contains(&(Stage::PipelineComplete, StageStatus::Success)));
}

#[tokio::test]
async fn transcode_can_be_skipped_by_flag() {
    let media = FakeMedia {
        duration: Some(12.0),
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, ok_transcriber(), FakeSummarizer { fail: false }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, false, false))
        .await;

    let statuses = harness.publisher.statuses();
    assert!(!statuses.iter().any(|(s, _)| *s == Stage::Transcode));
    assert!(statuses.contains(&(Stage::PipelineComplete, StageStatus::Success)));
}

#[tokio::test]
async fn video_source_is_normalized_before_transcription() {
    let media = FakeMedia {
        duration: None,
        ..FakeMedia::default()
    };
    let harness = Harness::with_source(
        media,
        ok_transcriber(),
        FakeSummarizer { fail: false },
        "source.webm",
    )
    .await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, false, true))
        .await;

    assert!(
        harness.media.called("extract_audio"),
        "a video container must go through audio normalization"
    );
    let statuses = harness.publisher.statuses();
    assert!(statuses.contains(&(Stage::AiSummary, StageStatus::Success)));
}

#[tokio::test]
async fn audio_source_is_sent_without_normalization() {
    let media = FakeMedia {
        duration: None,
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, ok_transcriber(), FakeSummarizer { fail: false }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, false, true))
        .await;

    assert!(!harness.media.called("extract_audio"));
    let statuses = harness.publisher.statuses();
    assert!(statuses.contains(&(Stage::AiSummary, StageStatus::Success)));
}

#[tokio::test]
async fn live_input_is_remuxed_before_probing() {
    let media = FakeMedia {
        duration: Some(35.0),
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, ok_transcriber(), FakeSummarizer { fail: false }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Live, false, false))
        .await;

    assert!(harness.media.called("remux"));
    assert!(harness.media.called("probe_duration"));
}

#[tokio::test]
async fn processing_precedes_terminal_status_per_stage() {
    let media = FakeMedia {
        duration: Some(35.0),
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, ok_transcriber(), FakeSummarizer { fail: false }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, true, true))
        .await;
    harness
        .wait_for(|e| e.stage == Stage::Thumbnail && e.status != StageStatus::Processing)
        .await;

    let statuses = harness.publisher.statuses();
    for stage in [Stage::Transcode, Stage::Thumbnail, Stage::AiSummary] {
        let processing = statuses
            .iter()
            .position(|(s, st)| *s == stage && *st == StageStatus::Processing);
        let terminal = statuses
            .iter()
            .position(|(s, st)| *s == stage && *st != StageStatus::Processing);
        assert!(
            processing.unwrap() < terminal.unwrap(),
            "{stage:?} terminal event before PROCESSING"
        );
    }
}

#[tokio::test]
async fn source_file_is_deleted_after_all_phases() {
    let media = FakeMedia {
        duration: Some(35.0),
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, ok_transcriber(), FakeSummarizer { fail: false }).await;

    harness
        .orchestrator
        .run(harness.job(MediaKind::Vod, true, true))
        .await;
    harness
        .wait_for(|e| e.stage == Stage::Thumbnail && e.status != StageStatus::Processing)
        .await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while harness.source_path.exists() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "source file should be deleted once thumbnail and AI phases finish"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
