//! Expression data model.
//!
//! An expression is the user-submitted formula plus its aggregate
//! evaluation state. It records the ids of its tasks but never owns them.

use crate::core::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a submitted expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpressionId(pub Uuid);

impl ExpressionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for ExpressionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExpressionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExpressionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Aggregate status of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpressionStatus {
    /// Submitted, no task activity yet.
    #[default]
    Pending,
    /// At least one task still outstanding.
    Computing,
    /// Root task finished; result is set.
    Completed,
    /// Parsing or a task failed; error is set.
    Error,
}

impl ExpressionStatus {
    /// Completed and Error are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpressionStatus::Completed | ExpressionStatus::Error)
    }
}

impl std::fmt::Display for ExpressionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionStatus::Pending => write!(f, "PENDING"),
            ExpressionStatus::Computing => write!(f, "COMPUTING"),
            ExpressionStatus::Completed => write!(f, "COMPLETED"),
            ExpressionStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// A submitted arithmetic expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub id: ExpressionId,
    /// Source text as submitted.
    pub expression: String,
    pub status: ExpressionStatus,
    pub result: Option<f64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Ids of the tasks this expression decomposed into.
    #[serde(default)]
    pub task_ids: Vec<TaskId>,
}

impl Expression {
    /// Create a pending expression for the given source text.
    pub fn new(text: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ExpressionId::new(),
            expression: text.to_string(),
            status: ExpressionStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            task_ids: Vec::new(),
        }
    }

    /// Move from Pending to Computing.
    ///
    /// Returns `true` if the status changed.
    pub fn start_computing(&mut self) -> bool {
        if self.status != ExpressionStatus::Pending {
            return false;
        }
        self.status = ExpressionStatus::Computing;
        self.touch();
        true
    }

    /// Resolve the expression with its root result.
    pub fn complete(&mut self, result: f64) {
        self.status = ExpressionStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.touch();
    }

    /// Resolve the expression as failed.
    pub fn fail(&mut self, error: &str) {
        self.status = ExpressionStatus::Error;
        self.result = None;
        self.error = Some(error.to_string());
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
