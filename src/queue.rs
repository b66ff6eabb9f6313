//! The job queue.
//!
//! Jobs are executed strictly in enqueue order and at most one is running at
//! any time, however many coordinators pull from the queue. Each job owns a
//! [`JobWorkspace`] created at enqueue time.
//!
//! The queue only knows about queued jobs and the running one. Terminal
//! states are reported through the event bus and the gateway.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use of_av::JobWorkspace;
use of_compose::CompositionPlan;
use of_core::events::{EventBus, EventPayload};
use of_core::{JobId, MediaMetadata, OverlaySpeed, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, Notify, OwnedMutexGuard};

use crate::fetch::Source;

/// What a requester asks for.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub source: Source,
    pub speed: OverlaySpeed,
    /// Opaque requester address handed back with the outcome.
    pub reply_to: String,
}

/// Lifecycle of a job. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One unit of work.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub request: JobRequest,
    pub workspace: JobWorkspace,
    /// Set once after probing.
    pub metadata: Option<MediaMetadata>,
    /// Set once after planning.
    pub plan: Option<CompositionPlan>,
}

/// Returned by [`JobQueue::enqueue`].
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: JobId,
    /// Jobs ahead of this one at enqueue time, including a running one.
    pub position: usize,
    pub input_ref: PathBuf,
    pub output_ref: PathBuf,
}

/// The right to execute one job. The next job can start once it is dropped.
#[derive(Debug)]
pub struct ExecutionPermit(#[allow(dead_code)] OwnedMutexGuard<()>);

/// A job taken off the queue together with its execution permit.
#[derive(Debug)]
pub struct ActiveJob {
    pub job: Job,
    pub permit: ExecutionPermit,
}

/// FIFO queue with a single execution slot.
pub struct JobQueue {
    pending: Mutex<VecDeque<Job>>,
    running: Mutex<Option<JobId>>,
    notify: Notify,
    slot: Arc<AsyncMutex<()>>,
    events: Arc<EventBus>,
    workspace_root: Option<PathBuf>,
}

impl JobQueue {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            running: Mutex::new(None),
            notify: Notify::new(),
            slot: Arc::new(AsyncMutex::new(())),
            events,
            workspace_root: None,
        }
    }

    /// Create job workspaces under `root` instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Append a job. Never rejects a request; only failing to create the
    /// job's transient storage is an error.
    pub fn enqueue(&self, request: JobRequest) -> Result<JobHandle> {
        let workspace = match &self.workspace_root {
            Some(root) => JobWorkspace::create_in(root)?,
            None => JobWorkspace::create()?,
        };

        let id = JobId::new();
        let handle = JobHandle {
            id,
            position: 0,
            input_ref: workspace.input(),
            output_ref: workspace.output(),
        };
        let job = Job {
            id,
            request,
            workspace,
            metadata: None,
            plan: None,
        };

        let position = {
            let mut pending = self.pending.lock();
            let position = pending.len() + usize::from(self.running.lock().is_some());
            pending.push_back(job);
            position
        };

        tracing::info!(job_id = %id, position, "Job queued");
        self.events.broadcast(EventPayload::JobQueued { job_id: id, position });
        self.notify.notify_one();

        Ok(JobHandle { position, ..handle })
    }

    /// Wait for the execution slot, then for the oldest pending job.
    ///
    /// Cancel-safe: a job is only removed from the queue in the same poll
    /// that returns it.
    pub async fn next(&self) -> ActiveJob {
        let permit = self.slot.clone().lock_owned().await;
        loop {
            let next = {
                let mut pending = self.pending.lock();
                let job = pending.pop_front();
                if let Some(job) = &job {
                    *self.running.lock() = Some(job.id);
                }
                job
            };
            if let Some(job) = next {
                return ActiveJob {
                    job,
                    permit: ExecutionPermit(permit),
                };
            }
            self.notify.notified().await;
        }
    }

    /// Mark the running job as done. The queue forgets it.
    pub fn finish(&self, id: JobId, state: JobState) {
        debug_assert!(state.is_terminal());
        let mut running = self.running.lock();
        if *running == Some(id) {
            *running = None;
        }
        tracing::debug!(job_id = %id, ?state, "Job left the queue");
    }

    /// State of a job the queue still holds. Finished jobs yield `None`.
    pub fn state(&self, id: JobId) -> Option<JobState> {
        if *self.running.lock() == Some(id) {
            return Some(JobState::Running);
        }
        self.pending
            .lock()
            .iter()
            .any(|job| job.id == id)
            .then_some(JobState::Queued)
    }

    /// Number of jobs waiting to run.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// The job currently holding the execution slot, if any.
    pub fn running(&self) -> Option<JobId> {
        *self.running.lock()
    }
}
