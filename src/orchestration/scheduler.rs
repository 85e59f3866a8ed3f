//! Scheduler for dependency-aware task dispatch.
//!
//! The scheduler hands out the oldest pending task whose dependencies are
//! all completed. Selection and the `Pending -> Processing` transition
//! happen under one exclusive task-table lock, so two concurrent callers
//! can never receive the same task.
//!
//! Operand values are filled in by the store when a dependency completes;
//! the scheduler only reads them.

use crate::core::{Task, TaskId, TaskStatus};
use crate::store::{Store, TaskTable};
use crate::{dlog_debug, dlog_warn};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Check if a task can be handed to a worker.
///
/// A task is eligible when it is pending, every dependency refers to a
/// completed task, and both operand values are known.
pub fn is_eligible(table: &TaskTable, task: &Task) -> bool {
    task.status == TaskStatus::Pending
        && task.dependencies.iter().all(|dep| {
            table
                .get(dep)
                .is_some_and(|t| t.status == TaskStatus::Completed)
        })
        && task.operand_values().is_some()
}

pub struct Scheduler {
    store: Arc<Store>,
    /// How long a task may stay processing before it is requeued.
    /// `None` keeps processing tasks forever.
    lease: Option<Duration>,
}

impl Scheduler {
    /// Create a scheduler over `store` with no lease.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, lease: None }
    }

    /// Set the processing lease.
    pub fn with_lease(mut self, lease: Option<Duration>) -> Self {
        self.lease = lease;
        self
    }

    pub fn lease(&self) -> Option<Duration> {
        self.lease
    }

    /// Take the next eligible task, marking it processing.
    ///
    /// Returns `None` when no task is eligible right now. That is a
    /// transient condition: callers retry later.
    pub fn next_eligible_task(&self) -> Option<Task> {
        if self.lease.is_some() {
            self.requeue_expired(Utc::now());
        }

        let mut table = self.store.write_tasks();
        let id = table
            .pending()
            .find(|task| is_eligible(&table, task))
            .map(|task| task.id)?;

        let task = table.start(&id)?;
        dlog_debug!(
            "Dispatched task {} ({} {:?} {:?})",
            task.id.short(),
            task.operation,
            task.arg1.value(),
            task.arg2.value()
        );
        Some(task)
    }

    /// Return processing tasks whose lease ran out by `now` to the queue.
    ///
    /// Does nothing when no lease is configured. Returns the requeued ids.
    pub fn requeue_expired(&self, now: DateTime<Utc>) -> Vec<TaskId> {
        let Some(lease) = self.lease.and_then(|l| chrono::Duration::from_std(l).ok()) else {
            return Vec::new();
        };

        let mut table = self.store.write_tasks();
        let expired: Vec<TaskId> = table
            .processing()
            .filter(|task| {
                task.started_at
                    .and_then(|started| started.checked_add_signed(lease))
                    .is_some_and(|deadline| deadline <= now)
            })
            .map(|task| task.id)
            .collect();

        for id in &expired {
            if table.requeue(id) {
                dlog_warn!("Task {} exceeded its lease, requeued", id.short());
            }
        }
        expired
    }
}
