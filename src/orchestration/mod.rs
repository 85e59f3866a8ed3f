//! Orchestration layer for distributed evaluation.
//!
//! This module provides the scheduler that hands tasks to workers, the
//! completion tracker that derives expression status from task status,
//! and the `Orchestrator` service that combines them over a shared store.

pub mod completion;
pub mod scheduler;
mod service;

pub use completion::{CompletionTracker, Outcome};
pub use scheduler::Scheduler;
pub use service::{Orchestrator, TaskReport};
