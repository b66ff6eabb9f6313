//! of-core: shared types, IDs, errors, configuration, and event system.
//!
//! This crate is the foundational dependency for all other of-* crates,
//! providing the job identifier, a unified error type with its failure
//! classification, the normalized media model, policy configuration, and a
//! broadcast event bus for job lifecycle events.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, FailureKind, Result};
pub use ids::*;
pub use media::*;
