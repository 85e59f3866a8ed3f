//! Orchestrator service.
//!
//! The `Orchestrator` is the single entry point the HTTP layer and the
//! in-process evaluator talk to. It owns the store and wires submission,
//! scheduling, result reporting and completion tracking together.

use crate::calc::{parse, Decomposer, OperationTimes};
use crate::core::{Expression, ExpressionId, Task, TaskGraph, TaskId, TaskStatus};
use crate::error::{Error, Result};
use crate::orchestration::completion::CompletionTracker;
use crate::orchestration::scheduler::Scheduler;
use crate::store::Store;
use crate::{dlog, dlog_debug, dlog_warn};
use std::sync::Arc;
use std::time::Duration;

/// What a worker reports back for a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskReport {
    Completed(f64),
    Failed(String),
}

pub struct Orchestrator {
    store: Arc<Store>,
    decomposer: Decomposer,
    scheduler: Scheduler,
    tracker: CompletionTracker,
}

impl Orchestrator {
    /// Create an orchestrator with an empty store.
    pub fn new(times: OperationTimes) -> Self {
        Self::with_store(Arc::new(Store::new()), times)
    }

    /// Create an orchestrator over an existing store.
    pub fn with_store(store: Arc<Store>, times: OperationTimes) -> Self {
        Self {
            decomposer: Decomposer::new(times),
            scheduler: Scheduler::new(Arc::clone(&store)),
            tracker: CompletionTracker::new(Arc::clone(&store)),
            store,
        }
    }

    /// Requeue tasks that stay processing longer than `lease`.
    pub fn with_lease(mut self, lease: Option<Duration>) -> Self {
        self.scheduler = self.scheduler.with_lease(lease);
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Accept an expression for evaluation.
    ///
    /// The expression record is created before parsing, so a rejected
    /// expression is still stored with status Error and its parse message.
    ///
    /// # Errors
    /// - `ExpressionRejected` when the text does not parse
    /// - `Validation` when the decomposition is not a single-rooted tree
    pub fn submit(&self, text: &str) -> Result<ExpressionId> {
        let expression = self.store.create_expression(text);
        let id = expression.id;
        dlog!("Expression {} submitted: {:?}", id.short(), text);

        let ast = match parse(text) {
            Ok(ast) => ast,
            Err(source) => {
                self.reject(&id, &source.to_string())?;
                return Err(Error::ExpressionRejected { id, source });
            }
        };

        let tasks = self.decomposer.decompose(&ast, id);
        if let Err(e) = Self::check_shape(&tasks) {
            self.reject(&id, &e.to_string())?;
            return Err(e);
        }

        let task_ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        dlog_debug!("Expression {} decomposed into {} tasks", id.short(), task_ids.len());
        self.store.save_tasks(tasks)?;
        self.store
            .modify_expression(&id, |e| e.task_ids = task_ids)?;
        self.tracker.recompute(&id)?;
        Ok(id)
    }

    fn check_shape(tasks: &[Task]) -> Result<()> {
        let graph = TaskGraph::from_tasks(tasks)?;
        if !graph.is_tree() {
            return Err(Error::Validation(
                "decomposition is not a single-rooted tree".to_string(),
            ));
        }
        Ok(())
    }

    fn reject(&self, id: &ExpressionId, message: &str) -> Result<()> {
        dlog_warn!("Expression {} rejected: {}", id.short(), message);
        self.store.modify_expression(id, |e| e.fail(message))?;
        Ok(())
    }

    pub fn expression(&self, id: &ExpressionId) -> Result<Expression> {
        self.store.get_expression(id)
    }

    /// All expressions, oldest first.
    pub fn expressions(&self) -> Vec<Expression> {
        self.store.list_expressions()
    }

    /// Hand out the next eligible task, if any.
    pub fn next_task(&self) -> Option<Task> {
        self.scheduler.next_eligible_task()
    }

    /// Record a worker's report for task `id` and update its expression.
    ///
    /// Reports are accepted for tasks in any status; a report for a task
    /// that is not processing is logged and applied anyway.
    ///
    /// # Errors
    /// Returns `TaskNotFound` when `id` is unknown. The store is unchanged.
    pub fn report(&self, id: &TaskId, report: TaskReport) -> Result<Expression> {
        let mut task = self.store.get_task(id)?;
        if task.status != TaskStatus::Processing {
            dlog_warn!("Task {} reported while {}", id.short(), task.status);
        }

        match report {
            TaskReport::Completed(result) => {
                dlog_debug!("Task {} completed: {}", id.short(), result);
                task.complete(result);
            }
            TaskReport::Failed(message) => {
                dlog_warn!("Task {} failed: {}", id.short(), message);
                task.fail(&message);
            }
        }

        let expression_id = task.expression_id;
        self.store.update_task(task)?;
        self.tracker.recompute(&expression_id)?;
        self.store.get_expression(&expression_id)
    }

    pub fn submit_result(&self, id: &TaskId, result: f64) -> Result<Expression> {
        self.report(id, TaskReport::Completed(result))
    }

    pub fn fail_task(&self, id: &TaskId, error: &str) -> Result<Expression> {
        self.report(id, TaskReport::Failed(error.to_string()))
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OperationTimes::default())
    }
}
