//! Execution coordinator.
//!
//! Pulls jobs off the [`JobQueue`] one at a time and drives each through
//! fetch, probe, plan, build, transcode and output validation. Every job ends
//! in exactly one terminal state, its workspace is removed, and the gateway
//! is told the outcome exactly once. Failed jobs are not retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use of_av::{Prober, Transcoder};
use of_compose::{build, Planner, TranscodePaths};
use of_core::config::Config;
use of_core::events::{EventBus, EventPayload};
use of_core::{Error, Result};
use tokio_util::sync::CancellationToken;

use crate::fetch::Fetcher;
use crate::gateway::{Artifact, Failure, Gateway, JobOutcome, ARTIFACT_MEDIA_TYPE};
use crate::queue::{ActiveJob, Job, JobQueue, JobState};

/// The external collaborators a coordinator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub prober: Arc<dyn Prober>,
    pub transcoder: Arc<dyn Transcoder>,
    pub gateway: Arc<dyn Gateway>,
}

pub struct Coordinator {
    queue: Arc<JobQueue>,
    collaborators: Collaborators,
    planner: Planner,
    overlay_path: PathBuf,
    transcode_timeout: Duration,
}

impl Coordinator {
    pub fn new(queue: Arc<JobQueue>, collaborators: Collaborators, config: &Config) -> Self {
        Self {
            queue,
            collaborators,
            planner: Planner::new(config.policy.clone()),
            overlay_path: config.overlay.path.clone(),
            transcode_timeout: config.tools.transcode_timeout(),
        }
    }

    fn events(&self) -> &EventBus {
        self.queue.events()
    }

    /// Process jobs until the token is cancelled.
    ///
    /// Cancellation is only observed between jobs; a running job is always
    /// taken to a terminal state first.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("Coordinator started");

        loop {
            let active = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                active = self.queue.next() => active,
            };
            self.process(active).await;
        }

        tracing::info!("Coordinator stopped");
    }

    /// Take one job from `Running` to a terminal state.
    pub async fn process(&self, active: ActiveJob) {
        let ActiveJob { mut job, permit } = active;
        let id = job.id;

        tracing::info!(job_id = %id, source = %job.request.source, speed = %job.request.speed, "Processing job");
        self.events().broadcast(EventPayload::JobStarted { job_id: id });

        let output = job.workspace.output();
        let result = match self.execute(&mut job).await {
            // Read the artifact before the workspace goes away.
            Ok(()) => read_artifact(&output, &job.request.source.file_stem()).await,
            Err(e) => Err(e),
        };

        let Job {
            request, workspace, ..
        } = job;
        if let Err(e) = workspace.close() {
            tracing::warn!(job_id = %id, error = %e, "Failed to remove job workspace");
        }

        let (state, result) = match result {
            Ok(artifact) => {
                let size_bytes = artifact.bytes.len() as u64;
                tracing::info!(job_id = %id, size_bytes, "Job succeeded");
                self.events()
                    .broadcast(EventPayload::JobSucceeded { job_id: id, size_bytes });
                (JobState::Succeeded, Ok(artifact))
            }
            Err(e) => {
                let failure = Failure::from(&e);
                tracing::error!(job_id = %id, kind = %failure.kind, error = %e, "Job failed");
                self.events().broadcast(EventPayload::JobFailed {
                    job_id: id,
                    kind: failure.kind,
                    error: e.to_string(),
                });
                (JobState::Failed, Err(failure))
            }
        };

        self.queue.finish(id, state);

        let outcome = JobOutcome {
            job_id: id,
            reply_to: request.reply_to,
            result,
        };
        if let Err(e) = self.collaborators.gateway.deliver(outcome).await {
            tracing::error!(job_id = %id, error = %e, "Failed to deliver outcome");
        }

        // Delivery order follows execution order.
        drop(permit);
    }

    async fn execute(&self, job: &mut Job) -> Result<()> {
        let c = &self.collaborators;
        let id = job.id;
        let input = job.workspace.input();
        let output = job.workspace.output();

        let fetched = c.fetcher.fetch(&job.request.source, &input).await?;
        tracing::debug!(job_id = %id, bytes = fetched, "Input stored");

        let metadata = job.metadata.insert(c.prober.probe(&input).await?);
        tracing::debug!(
            job_id = %id,
            kind = %metadata.kind(),
            width = metadata.width_px,
            height = metadata.height_px,
            duration = ?metadata.duration(),
            "Probed"
        );

        let plan = job.plan.insert(self.planner.plan(metadata, job.request.speed)?);
        self.events().broadcast(EventPayload::JobPlanned {
            job_id: id,
            kind: plan.kind,
            scale_factor_px: plan.scale_factor_px,
        });

        let spec = build(
            plan,
            &TranscodePaths {
                primary: input,
                overlay: self.overlay_path.clone(),
                output: output.clone(),
            },
        )?;

        match tokio::time::timeout(self.transcode_timeout, c.transcoder.transcode(&spec)).await {
            Ok(result) => result?,
            Err(_) => return Err(Error::timeout("transcoder", self.transcode_timeout)),
        }

        let size = tokio::fs::metadata(&output)
            .await
            .map_err(|e| Error::Transcode(format!("no output produced: {e}")))?
            .len();
        if size > spec.size_cap_bytes {
            return Err(Error::SizeLimitExceeded {
                actual: size,
                limit: spec.size_cap_bytes,
            });
        }

        Ok(())
    }
}

async fn read_artifact(output: &Path, stem: &str) -> Result<Artifact> {
    let bytes = tokio::fs::read(output).await?;
    Ok(Artifact {
        bytes: Bytes::from(bytes),
        file_name: format!("{stem}-overlay.mp4"),
        media_type: ARTIFACT_MEDIA_TYPE,
    })
}
