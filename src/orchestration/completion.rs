//! Completion tracking for expressions.
//!
//! After any task of an expression changes, the `CompletionTracker`
//! recomputes the expression's aggregate status from its tasks:
//!
//! - a failed task fails the expression with that task's error
//! - when every task is completed, the root task's result becomes the
//!   expression's result
//! - otherwise a pending expression moves to computing
//!
//! Completed and Error are final; recomputing a resolved expression is a
//! no-op.

use crate::core::{ExpressionId, ExpressionStatus, Task, TaskGraph, TaskStatus};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::{dlog, dlog_warn};
use std::sync::Arc;

/// What the tasks of an expression say about it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A task failed with this message.
    Failed(String),
    /// All tasks completed; the root produced this value.
    Resolved(f64),
    /// Work remains.
    InProgress,
}

/// Derive an expression outcome from its tasks.
///
/// # Errors
/// Returns `Error::Validation` when the tasks are all completed but do not
/// form a graph with a single root.
pub fn outcome(tasks: &[Task]) -> Result<Outcome> {
    if let Some(failed) = tasks.iter().find(|t| t.status == TaskStatus::Error) {
        let message = failed.error.as_deref().unwrap_or("task failed");
        return Ok(Outcome::Failed(message.to_string()));
    }

    if tasks.is_empty() || tasks.iter().any(|t| t.status != TaskStatus::Completed) {
        return Ok(Outcome::InProgress);
    }

    let root = TaskGraph::from_tasks(tasks)?
        .root()
        .ok_or_else(|| Error::Validation("tasks have no single root".to_string()))?;

    Ok(tasks
        .iter()
        .find(|t| t.id == root)
        .and_then(Task::completed_result)
        .map_or(Outcome::InProgress, Outcome::Resolved))
}

pub struct CompletionTracker {
    store: Arc<Store>,
}

impl CompletionTracker {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Recompute the status of expression `id` from its tasks.
    ///
    /// Holds the expression write lock for the whole read-derive-write
    /// sequence so concurrent reports cannot lose an update.
    pub fn recompute(&self, id: &ExpressionId) -> Result<ExpressionStatus> {
        let mut expressions = self.store.write_expressions();
        let expression = expressions
            .get_mut(id)
            .ok_or(Error::ExpressionNotFound(*id))?;

        if expression.status.is_terminal() {
            return Ok(expression.status);
        }

        let tasks = self.store.tasks_for_expression(id);
        match outcome(&tasks)? {
            Outcome::Failed(message) => {
                dlog_warn!("Expression {} failed: {}", id.short(), message);
                expression.fail(&message);
            }
            Outcome::Resolved(result) => {
                dlog!("Expression {} completed: {}", id.short(), result);
                expression.complete(result);
            }
            Outcome::InProgress => {
                expression.start_computing();
            }
        }
        Ok(expression.status)
    }
}
