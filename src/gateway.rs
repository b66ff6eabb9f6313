//! Delivery of job outcomes back to whoever asked for them.
//!
//! The coordinator calls [`Gateway::deliver`] exactly once per job, after the
//! job's transient storage has been removed. A successful outcome therefore
//! carries the artifact in memory.

use std::future::Future;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use of_core::{Error, FailureKind, JobId, Result};
use tokio::sync::mpsc;

/// Media type of every produced artifact.
pub const ARTIFACT_MEDIA_TYPE: &str = "video/mp4";

/// The produced media.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub bytes: Bytes,
    pub file_name: String,
    pub media_type: &'static str,
}

/// What the requester is told about a failed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    /// User-facing text; diagnostics stay in the logs.
    pub message: String,
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        let kind = err.kind();
        Self {
            kind,
            message: kind.user_message().to_string(),
        }
    }
}

/// Terminal result of one job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    /// Opaque requester address copied from the job request.
    pub reply_to: String,
    pub result: std::result::Result<Artifact, Failure>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// The messaging front end.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn deliver(&self, outcome: JobOutcome) -> Result<()>;
}

/// Writes artifacts into a directory and reports failures on stderr.
#[derive(Debug, Clone)]
pub struct DirectoryGateway {
    dir: PathBuf,
}

impl DirectoryGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Gateway for DirectoryGateway {
    async fn deliver(&self, outcome: JobOutcome) -> Result<()> {
        match outcome.result {
            Ok(artifact) => {
                tokio::fs::create_dir_all(&self.dir).await?;
                let path = self.dir.join(&artifact.file_name);
                tokio::fs::write(&path, &artifact.bytes).await?;
                tracing::info!(job_id = %outcome.job_id, path = %path.display(), "Artifact written");
                println!("{}: {}", outcome.reply_to, path.display());
            }
            Err(failure) => {
                eprintln!("{}: {} ({})", outcome.reply_to, failure.message, failure.kind);
            }
        }
        Ok(())
    }
}

/// Forwards outcomes into a channel.
#[derive(Debug, Clone)]
pub struct ChannelGateway {
    tx: mpsc::UnboundedSender<JobOutcome>,
}

impl ChannelGateway {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Gateway for ChannelGateway {
    async fn deliver(&self, outcome: JobOutcome) -> Result<()> {
        self.tx
            .send(outcome)
            .map_err(|_| Error::Internal("outcome receiver dropped".into()))
    }
}

/// Counts kept while relaying outcomes from a [`ChannelGateway`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    pub expected: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl RelaySummary {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            ..Self::default()
        }
    }

    /// Jobs whose outcome never arrived.
    pub fn missing(&self) -> usize {
        self.expected.saturating_sub(self.delivered)
    }

    fn record(&mut self, outcome: &JobOutcome) {
        self.delivered += 1;
        if !outcome.is_success() {
            self.failed += 1;
        }
    }
}

/// Pass outcomes on to `sink` until `summary.expected` have arrived, the
/// channel closes, or `interrupt` completes.
pub async fn relay<F>(
    outcomes: &mut mpsc::UnboundedReceiver<JobOutcome>,
    sink: &dyn Gateway,
    summary: &mut RelaySummary,
    interrupt: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    while summary.delivered < summary.expected {
        let outcome = tokio::select! {
            outcome = outcomes.recv() => outcome,
            _ = &mut interrupt => {
                tracing::warn!(missing = summary.missing(), "Interrupted");
                None
            }
        };
        let Some(outcome) = outcome else {
            break;
        };
        summary.record(&outcome);
        sink.deliver(outcome).await?;
    }

    Ok(())
}

/// Pass on whatever outcomes are already waiting, without blocking.
pub async fn drain(
    outcomes: &mut mpsc::UnboundedReceiver<JobOutcome>,
    sink: &dyn Gateway,
    summary: &mut RelaySummary,
) -> Result<()> {
    while let Ok(outcome) = outcomes.try_recv() {
        summary.record(&outcome);
        sink.deliver(outcome).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(ok: bool) -> JobOutcome {
        JobOutcome {
            job_id: JobId::new(),
            reply_to: String::new(),
            result: if ok {
                Ok(artifact())
            } else {
                Err(Failure::from(&Error::Download("refused".into())))
            },
        }
    }

    fn artifact() -> Artifact {
        Artifact {
            bytes: Bytes::from_static(b"mp4"),
            file_name: "cat-overlay.mp4".into(),
            media_type: ARTIFACT_MEDIA_TYPE,
        }
    }

    #[test]
    fn failure_carries_only_user_message() {
        let err = Error::tool("ffmpeg", "Invalid data found when processing input");
        let failure = Failure::from(&err);
        assert_eq!(failure.kind, FailureKind::Transcode);
        assert_eq!(failure.message, FailureKind::Transcode.user_message());
        assert!(!failure.message.contains("Invalid data"));
    }

    #[tokio::test]
    async fn directory_gateway_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = DirectoryGateway::new(dir.path().join("out"));
        gateway
            .deliver(JobOutcome {
                job_id: JobId::new(),
                reply_to: "cat.gif".into(),
                result: Ok(artifact()),
            })
            .await
            .unwrap();
        let written = std::fs::read(dir.path().join("out/cat-overlay.mp4")).unwrap();
        assert_eq!(written, b"mp4");
    }

    #[tokio::test]
    async fn directory_gateway_accepts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = DirectoryGateway::new(dir.path());
        let outcome = JobOutcome {
            job_id: JobId::new(),
            reply_to: "broken.bin".into(),
            result: Err(Failure::from(&Error::Probe("garbage".into()))),
        };
        gateway.deliver(outcome).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn channel_gateway_forwards() {
        let (gateway, mut rx) = ChannelGateway::new();
        let job_id = JobId::new();
        gateway
            .deliver(JobOutcome {
                job_id,
                reply_to: "chat-42".into(),
                result: Ok(artifact()),
            })
            .await
            .unwrap();
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.job_id, job_id);
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn relay_counts_every_outcome() {
        let (producer, mut rx) = ChannelGateway::new();
        let (sink, mut delivered) = ChannelGateway::new();
        producer.deliver(outcome(true)).await.unwrap();
        producer.deliver(outcome(false)).await.unwrap();

        let mut summary = RelaySummary::new(2);
        relay(&mut rx, &sink, &mut summary, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.missing(), 0);
        assert!(delivered.try_recv().is_ok());
        assert!(delivered.try_recv().is_ok());
    }

    #[tokio::test]
    async fn interrupted_relay_reports_missing_jobs() {
        let (producer, mut rx) = ChannelGateway::new();
        let (sink, _delivered) = ChannelGateway::new();
        producer.deliver(outcome(true)).await.unwrap();

        let mut summary = RelaySummary::new(3);
        let interrupt = async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        };
        relay(&mut rx, &sink, &mut summary, interrupt).await.unwrap();

        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.missing(), 2);

        // The job that was running when the interrupt came still reports.
        producer.deliver(outcome(false)).await.unwrap();
        drain(&mut rx, &sink, &mut summary).await.unwrap();
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.missing(), 1);
    }

    #[tokio::test]
    async fn channel_gateway_reports_closed_receiver() {
        let (gateway, rx) = ChannelGateway::new();
        drop(rx);
        let result = gateway
            .deliver(JobOutcome {
                job_id: JobId::new(),
                reply_to: String::new(),
                result: Ok(artifact()),
            })
            .await;
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
