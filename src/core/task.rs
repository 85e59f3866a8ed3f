//! Task data model for expression decomposition.
//!
//! A task is one atomic step of an expression: a literal value or a
//! binary arithmetic operation over two operands. Composite tasks refer
//! to the tasks producing their operands by id only; the store owns every
//! task and resolves those references.

use crate::core::expression::ExpressionId;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output. Ordered so pending queues can break
/// creation-time ties deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Task status in its lifecycle.
///
/// `Pending -> Processing -> Completed | Error`. Value tasks are
/// created already `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting for its operands or for a worker.
    #[default]
    Pending,
    /// Handed to a worker, result not yet reported.
    Processing,
    /// Result known.
    Completed,
    /// The operation failed (e.g. division by zero).
    Error,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Processing => write!(f, "PROCESSING"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
            TaskStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// The arithmetic step a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    /// A literal; its result is its first operand.
    Value,
}

impl Operation {
    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Addition => "ADDITION",
            Operation::Subtraction => "SUBTRACTION",
            Operation::Multiplication => "MULTIPLICATION",
            Operation::Division => "DIVISION",
            Operation::Value => "VALUE",
        }
    }

    /// Evaluate the operation over two operands.
    ///
    /// # Errors
    /// Returns `Error::DivisionByZero` when dividing by exactly zero.
    pub fn apply(&self, arg1: f64, arg2: f64) -> Result<f64> {
        match self {
            Operation::Addition => Ok(arg1 + arg2),
            Operation::Subtraction => Ok(arg1 - arg2),
            Operation::Multiplication => Ok(arg1 * arg2),
            Operation::Division => {
                if arg2 == 0.0 {
                    return Err(Error::DivisionByZero);
                }
                Ok(arg1 / arg2)
            }
            Operation::Value => Ok(arg1),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operand slot of a task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Operand {
    /// A number fixed at construction time.
    Literal { value: f64 },
    /// The result of another task, filled in once that task completes.
    Task { id: TaskId, value: Option<f64> },
}

impl Operand {
    /// Reference another task, copying its result if already known.
    pub fn from_task(task: &Task) -> Self {
        Operand::Task {
            id: task.id,
            value: task.completed_result(),
        }
    }

    /// The operand's numeric value, if known.
    pub fn value(&self) -> Option<f64> {
        match self {
            Operand::Literal { value } => Some(*value),
            Operand::Task { value, .. } => *value,
        }
    }

    /// The task this operand depends on, if any.
    pub fn source(&self) -> Option<TaskId> {
        match self {
            Operand::Literal { .. } => None,
            Operand::Task { id, .. } => Some(*id),
        }
    }
}

/// A single task in an expression's decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// The expression this task belongs to.
    pub expression_id: ExpressionId,
    /// What the task computes.
    pub operation: Operation,
    /// Left operand.
    pub arg1: Operand,
    /// Right operand.
    pub arg2: Operand,
    /// Current execution status.
    pub status: TaskStatus,
    /// Computed value once completed.
    pub result: Option<f64>,
    /// Failure message when the task is in `Error`.
    pub error: Option<String>,
    /// Simulated execution time in milliseconds, passed to workers.
    pub operation_time: u64,
    /// Ids of the tasks supplying this task's operands.
    pub dependencies: Vec<TaskId>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When a worker picked the task up.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task completed (success or failure).
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a literal task, already completed with its own value.
    pub fn value(expression_id: ExpressionId, literal: f64) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            expression_id,
            operation: Operation::Value,
            arg1: Operand::Literal { value: literal },
            arg2: Operand::Literal { value: 0.0 },
            status: TaskStatus::Completed,
            result: Some(literal),
            error: None,
            operation_time: 0,
            dependencies: Vec::new(),
            created_at: now,
            started_at: None,
            completed_at: Some(now),
        }
    }

    /// Create a pending binary task over the results of `left` and `right`.
    ///
    /// Operand values are copied from dependencies that are already completed.
    pub fn composite(
        expression_id: ExpressionId,
        operation: Operation,
        left: &Task,
        right: &Task,
        operation_time: u64,
    ) -> Self {
        Self {
            id: TaskId::new(),
            expression_id,
            operation,
            arg1: Operand::from_task(left),
            arg2: Operand::from_task(right),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            operation_time,
            dependencies: vec![left.id, right.id],
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Hand the task to a worker.
    pub fn start(&mut self) {
        self.status = TaskStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    /// Mark the task as completed with a result.
    pub fn complete(&mut self, result: f64) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the task as failed with an error message.
    pub fn fail(&mut self, error: &str) {
        self.status = TaskStatus::Error;
        self.result = None;
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
    }

    /// Return a processing task to the pending queue.
    pub fn requeue(&mut self) {
        self.status = TaskStatus::Pending;
        self.started_at = None;
    }

    /// The result, only when the task is completed.
    pub fn completed_result(&self) -> Option<f64> {
        match self.status {
            TaskStatus::Completed => self.result,
            _ => None,
        }
    }

    /// Both operand values, if both are known.
    pub fn operand_values(&self) -> Option<(f64, f64)> {
        Some((self.arg1.value()?, self.arg2.value()?))
    }

    /// Write a dependency's result into every operand slot that refers to it.
    ///
    /// Returns `true` if any slot referred to `dependency`.
    pub fn resolve_operand(&mut self, dependency: TaskId, result: f64) -> bool {
        let mut resolved = false;
        for slot in [&mut self.arg1, &mut self.arg2] {
            if let Operand::Task { id, value } = slot {
                if *id == dependency {
                    *value = Some(result);
                    resolved = true;
                }
            }
        }
        resolved
    }

    /// Check if `id` is one of this task's dependencies.
    pub fn depends_on(&self, id: &TaskId) -> bool {
        self.dependencies.contains(id)
    }

    /// Check if the task is in a terminal state (Completed or Error).
    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Error)
    }
}
