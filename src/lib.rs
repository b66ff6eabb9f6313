//! Overlayforge - composites a looping overlay animation onto images, GIFs
//! and videos.
//!
//! The library crate wires the pipeline together: sources are fetched into a
//! per-job workspace, queued, and executed one at a time by the
//! [`coordinator::Coordinator`], which reports each outcome through a
//! [`gateway::Gateway`].

pub mod config;
pub mod coordinator;
pub mod fetch;
pub mod gateway;
pub mod queue;

pub use coordinator::{Collaborators, Coordinator};
pub use fetch::{Fetcher, HttpFetcher, LocalFetcher, Source, SourceFetcher};
pub use gateway::{Artifact, ChannelGateway, DirectoryGateway, Failure, Gateway, JobOutcome};
pub use queue::{ActiveJob, Job, JobHandle, JobQueue, JobRequest, JobState};
