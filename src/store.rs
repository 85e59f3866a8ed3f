//! In-memory expression and task tables.
//!
//! The store holds two independently locked tables. Readers take a shared
//! lock on one table, writers an exclusive lock on one table. Code that
//! needs both must lock the expression table first and the task table
//! second; nothing in this crate acquires them in the other order.
//!
//! Updates are last-writer-wins. Completing a task writes its result into
//! the operand slots of every dependent task under the same task-table
//! lock, so the scheduler never has to resolve operands itself.

use crate::core::{Expression, ExpressionId, Task, TaskId, TaskStatus};
use crate::error::{Error, Result};
use crate::dlog_debug;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Expressions keyed by id.
pub type ExpressionTable = HashMap<ExpressionId, Expression>;

/// Ordering key for the pending queue: oldest first, ties broken by id.
type PendingKey = (DateTime<Utc>, TaskId);

/// Tasks keyed by id, plus the indexes the scheduler relies on.
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: HashMap<TaskId, Task>,
    /// Reverse dependency edges: task -> tasks consuming its result.
    dependents: HashMap<TaskId, Vec<TaskId>>,
    /// Task ids per expression, in decomposition order.
    by_expression: HashMap<ExpressionId, Vec<TaskId>>,
    /// Pending tasks ordered by creation time, then id.
    pending: BTreeSet<PendingKey>,
}

impl TaskTable {
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Pending tasks, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &Task> + '_ {
        self.pending.iter().filter_map(|(_, id)| self.tasks.get(id))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Tasks currently handed out to workers.
    pub fn processing(&self) -> impl Iterator<Item = &Task> + '_ {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Processing)
    }

    /// An expression's tasks in decomposition order.
    pub fn for_expression(&self, id: &ExpressionId) -> Vec<&Task> {
        self.by_expression
            .get(id)
            .map(|ids| ids.iter().filter_map(|t| self.tasks.get(t)).collect())
            .unwrap_or_default()
    }

    /// Tasks that consume `id`'s result.
    pub fn dependents(&self, id: &TaskId) -> &[TaskId] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Insert a batch of new tasks atomically.
    ///
    /// # Errors
    /// Returns a validation error, leaving the table unchanged, if any id
    /// is already present or repeated within the batch.
    pub fn insert_all(&mut self, tasks: Vec<Task>) -> Result<()> {
        let mut batch = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            if self.tasks.contains_key(&task.id) || !batch.insert(task.id) {
                return Err(Error::Validation(format!("Task {} already exists", task.id)));
            }
        }

        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        for task in tasks {
            for dep in &task.dependencies {
                self.dependents.entry(*dep).or_default().push(task.id);
            }
            self.by_expression
                .entry(task.expression_id)
                .or_default()
                .push(task.id);
            if task.status == TaskStatus::Pending {
                self.pending.insert((task.created_at, task.id));
            }
            self.tasks.insert(task.id, task);
        }

        // Fill operands whose producers were already completed on arrival.
        for id in ids {
            if let Some(result) = self.tasks.get(&id).and_then(Task::completed_result) {
                self.propagate(id, result);
            }
        }
        Ok(())
    }

    /// Replace a stored task with a new version of itself.
    ///
    /// # Errors
    /// - `TaskNotFound` if the id is unknown
    /// - `Validation` if the owning expression or dependency set changed
    pub fn replace(&mut self, task: Task) -> Result<()> {
        let old = self
            .tasks
            .get(&task.id)
            .ok_or(Error::TaskNotFound(task.id))?;

        if old.expression_id != task.expression_id || old.dependencies != task.dependencies {
            return Err(Error::Validation(format!(
                "Task {} cannot change its expression or dependencies",
                task.id
            )));
        }

        if old.status == TaskStatus::Pending {
            self.pending.remove(&(old.created_at, old.id));
        }
        if task.status == TaskStatus::Pending {
            self.pending.insert((task.created_at, task.id));
        }

        let id = task.id;
        let result = task.completed_result();
        self.tasks.insert(id, task);

        if let Some(result) = result {
            self.propagate(id, result);
        }
        Ok(())
    }

    /// Mark a pending task as processing and return a copy of it.
    pub(crate) fn start(&mut self, id: &TaskId) -> Option<Task> {
        let task = self.tasks.get_mut(id)?;
        if task.status != TaskStatus::Pending {
            return None;
        }
        self.pending.remove(&(task.created_at, task.id));
        task.start();
        Some(task.clone())
    }

    /// Return a processing task to the pending queue.
    pub(crate) fn requeue(&mut self, id: &TaskId) -> bool {
        let Some(task) = self.tasks.get_mut(id) else {
            return false;
        };
        if task.status != TaskStatus::Processing {
            return false;
        }
        task.requeue();
        self.pending.insert((task.created_at, task.id));
        true
    }

    /// Write a completed task's result into its dependents' operand slots.
    fn propagate(&mut self, id: TaskId, result: f64) {
        let Some(dependents) = self.dependents.get(&id) else {
            return;
        };
        for dependent in dependents {
            if let Some(task) = self.tasks.get_mut(dependent) {
                if task.resolve_operand(id, result) {
                    dlog_debug!(
                        "Propagated {} from task {} into task {}",
                        result,
                        id.short(),
                        dependent.short()
                    );
                }
            }
        }
    }
}

/// Concurrency-safe storage for expressions and tasks.
///
/// Lock order when both tables are needed: expressions, then tasks.
#[derive(Debug, Default)]
pub struct Store {
    expressions: RwLock<ExpressionTable>,
    tasks: RwLock<TaskTable>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Lock domains ==========

    /// Shared lock on the expression table.
    pub fn read_expressions(&self) -> RwLockReadGuard<'_, ExpressionTable> {
        self.expressions.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive lock on the expression table. Take before the task lock.
    pub fn write_expressions(&self) -> RwLockWriteGuard<'_, ExpressionTable> {
        self.expressions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared lock on the task table.
    pub fn read_tasks(&self) -> RwLockReadGuard<'_, TaskTable> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive lock on the task table.
    pub fn write_tasks(&self) -> RwLockWriteGuard<'_, TaskTable> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== Expressions ==========

    /// Create and store a new pending expression.
    pub fn create_expression(&self, text: &str) -> Expression {
        let expression = Expression::new(text);
        self.write_expressions()
            .insert(expression.id, expression.clone());
        expression
    }

    pub fn get_expression(&self, id: &ExpressionId) -> Result<Expression> {
        self.read_expressions()
            .get(id)
            .cloned()
            .ok_or(Error::ExpressionNotFound(*id))
    }

    /// Snapshot of every expression, oldest first.
    pub fn list_expressions(&self) -> Vec<Expression> {
        let mut all: Vec<Expression> = self.read_expressions().values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    /// Replace a stored expression, refreshing its update timestamp.
    pub fn update_expression(&self, mut expression: Expression) -> Result<()> {
        let mut table = self.write_expressions();
        let slot = table
            .get_mut(&expression.id)
            .ok_or(Error::ExpressionNotFound(expression.id))?;
        expression.touch();
        *slot = expression;
        Ok(())
    }

    /// Apply `f` to a stored expression in place and return the result.
    pub fn modify_expression<F>(&self, id: &ExpressionId, f: F) -> Result<Expression>
    where
        F: FnOnce(&mut Expression),
    {
        let mut table = self.write_expressions();
        let expression = table.get_mut(id).ok_or(Error::ExpressionNotFound(*id))?;
        f(expression);
        expression.touch();
        Ok(expression.clone())
    }

    // ========== Tasks ==========

    /// Bulk insert one decomposition's tasks.
    pub fn save_tasks(&self, tasks: Vec<Task>) -> Result<()> {
        let count = tasks.len();
        self.write_tasks().insert_all(tasks)?;
        dlog_debug!("Saved {} tasks", count);
        Ok(())
    }

    pub fn get_task(&self, id: &TaskId) -> Result<Task> {
        self.read_tasks()
            .get(id)
            .cloned()
            .ok_or(Error::TaskNotFound(*id))
    }

    /// Replace a stored task; completion propagates into dependents.
    pub fn update_task(&self, task: Task) -> Result<()> {
        self.write_tasks().replace(task)
    }

    /// An expression's tasks in decomposition order.
    pub fn tasks_for_expression(&self, id: &ExpressionId) -> Vec<Task> {
        self.read_tasks()
            .for_expression(id)
            .into_iter()
            .cloned()
            .collect()
    }
}
