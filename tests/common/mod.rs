//! Shared test harness for integration tests.
//!
//! Provides fake collaborators (fetcher, prober, transcoder) and a
//! [`TestHarness`] that runs one or more coordinators against a shared
//! [`JobQueue`], collecting outcomes through a [`ChannelGateway`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use of_av::{Prober, Transcoder};
use of_compose::TranscodeSpec;
use of_core::config::Config;
use of_core::events::EventBus;
use of_core::{Error, MediaMetadata, OverlaySpeed, Result};
use overlayforge::{
    ChannelGateway, Collaborators, Coordinator, Fetcher, JobHandle, JobOutcome, JobQueue,
    JobRequest, Source,
};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Writes the source name into the job's input; names containing
/// `unreachable` fail.
#[derive(Default)]
pub struct FakeFetcher;

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, source: &Source, dest: &Path) -> Result<u64> {
        let name = source.to_string();
        if name.contains("unreachable") {
            return Err(Error::Download(format!("{name}: connection refused")));
        }
        tokio::fs::write(dest, name.as_bytes()).await?;
        Ok(name.len() as u64)
    }
}

/// Looks the input's content (the source name) up in a table.
#[derive(Default)]
pub struct FakeProber {
    known: Mutex<HashMap<String, MediaMetadata>>,
    pub calls: AtomicUsize,
}

impl FakeProber {
    pub fn with(self, name: &str, metadata: MediaMetadata) -> Self {
        self.known.lock().insert(name.to_string(), metadata);
        self
    }
}

#[async_trait]
impl Prober for FakeProber {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, path: &Path) -> Result<MediaMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = tokio::fs::read_to_string(path).await?;
        self.known
            .lock()
            .get(&content)
            .cloned()
            .ok_or_else(|| Error::Probe(format!("{content}: invalid data found")))
    }
}

/// How the fake transcoder behaves.
#[derive(Debug, Clone)]
pub enum TranscodeBehavior {
    /// Write an artifact of this many bytes after `delay`.
    Write { bytes: usize, delay: Duration },
    /// Never finish.
    Hang,
    /// Exit with a tool error.
    Fail,
}

/// Records every spec it is handed and tracks overlapping calls.
pub struct FakeTranscoder {
    behavior: Mutex<TranscodeBehavior>,
    pub specs: Mutex<Vec<TranscodeSpec>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new(behavior: TranscodeBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            specs: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Writes a small artifact immediately.
    pub fn ok() -> Self {
        Self::new(TranscodeBehavior::Write {
            bytes: 1024,
            delay: Duration::ZERO,
        })
    }

    pub fn calls(&self) -> usize {
        self.specs.lock().len()
    }

    pub fn set_behavior(&self, behavior: TranscodeBehavior) {
        *self.behavior.lock() = behavior;
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, spec: &TranscodeSpec) -> Result<()> {
        self.specs.lock().push(spec.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let behavior = self.behavior.lock().clone();
        let result = match behavior {
            TranscodeBehavior::Write { bytes, delay } => {
                tokio::time::sleep(delay).await;
                tokio::fs::write(&spec.output, vec![0u8; bytes]).await?;
                Ok(())
            }
            TranscodeBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            TranscodeBehavior::Fail => Err(Error::tool("ffmpeg", "exited with status 1: boom")),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// Metadata fixtures
// ---------------------------------------------------------------------------

pub fn video(width_px: u32, height_px: u32, duration_secs: f64) -> MediaMetadata {
    MediaMetadata {
        width_px,
        height_px,
        duration_secs: Some(duration_secs),
        frame_count: (duration_secs * 30.0) as u64,
        fps: Some(30.0),
        codec: Some("h264".into()),
        has_visual_stream: true,
    }
}

pub fn still(width_px: u32, height_px: u32) -> MediaMetadata {
    MediaMetadata {
        width_px,
        height_px,
        duration_secs: None,
        frame_count: 1,
        fps: None,
        codec: Some("mjpeg".into()),
        has_visual_stream: true,
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A running pipeline with fake collaborators.
pub struct TestHarness {
    pub queue: Arc<JobQueue>,
    pub prober: Arc<FakeProber>,
    pub transcoder: Arc<FakeTranscoder>,
    pub outcomes: mpsc::UnboundedReceiver<JobOutcome>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    _dir: TempDir,
}

impl TestHarness {
    /// Start `workers` coordinators sharing one queue.
    pub fn start(
        mut config: Config,
        prober: FakeProber,
        transcoder: FakeTranscoder,
        workers: usize,
    ) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let overlay = dir.path().join("overlay.gif");
        std::fs::write(&overlay, b"GIF89a").expect("failed to write overlay");
        config.overlay.path = overlay;

        let workspaces = dir.path().join("jobs");
        std::fs::create_dir(&workspaces).expect("failed to create workspace root");

        let queue = Arc::new(
            JobQueue::new(Arc::new(EventBus::default())).with_workspace_root(workspaces),
        );
        let prober = Arc::new(prober);
        let transcoder = Arc::new(transcoder);
        let (gateway, outcomes) = ChannelGateway::new();

        let collaborators = Collaborators {
            fetcher: Arc::new(FakeFetcher),
            prober: prober.clone(),
            transcoder: transcoder.clone(),
            gateway: Arc::new(gateway),
        };

        let cancel = CancellationToken::new();
        let workers = (0..workers)
            .map(|_| {
                let coordinator = Coordinator::new(queue.clone(), collaborators.clone(), &config);
                let cancel = cancel.clone();
                tokio::spawn(async move { coordinator.run(cancel).await })
            })
            .collect();

        Self {
            queue,
            prober,
            transcoder,
            outcomes,
            cancel,
            workers,
            _dir: dir,
        }
    }

    pub fn enqueue(&self, name: &str) -> JobHandle {
        self.enqueue_with_speed(name, OverlaySpeed::default())
    }

    pub fn enqueue_with_speed(&self, name: &str, speed: OverlaySpeed) -> JobHandle {
        self.queue
            .enqueue(JobRequest {
                source: Source::Local(PathBuf::from(name)),
                speed,
                reply_to: name.to_string(),
            })
            .expect("enqueue failed")
    }

    pub async fn next_outcome(&mut self) -> JobOutcome {
        tokio::time::timeout(Duration::from_secs(10), self.outcomes.recv())
            .await
            .expect("timed out waiting for outcome")
            .expect("gateway closed")
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        for worker in self.workers {
            worker.await.expect("coordinator panicked");
        }
    }
}
