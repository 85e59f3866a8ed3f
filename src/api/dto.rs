//! Wire types for the HTTP API.
//!
//! Shared by the axum handlers and the worker agent's client.

use crate::core::{Expression, ExpressionId, ExpressionStatus, Operation, Task, TaskId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRequest {
    #[serde(default)]
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub id: ExpressionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionResponse {
    pub id: ExpressionId,
    pub status: ExpressionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Expression> for ExpressionResponse {
    fn from(expression: &Expression) -> Self {
        Self {
            id: expression.id,
            status: expression.status,
            result: expression.result,
            error: expression.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionsResponse {
    pub expressions: Vec<ExpressionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionDetailResponse {
    pub expression: ExpressionResponse,
}

/// A task as handed to a worker: operands are already values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: TaskId,
    pub arg1: f64,
    pub arg2: f64,
    pub operation: Operation,
    /// Simulated execution time in milliseconds.
    pub operation_time: u64,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            arg1: task.arg1.value().unwrap_or_default(),
            arg2: task.arg2.value().unwrap_or_default(),
            operation: task.operation,
            operation_time: task.operation_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskResponse>,
}

/// A worker's report. Exactly one of `result` and `error` is expected;
/// `error` wins when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultRequest {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResultRequest {
    pub fn completed(id: TaskId, result: f64) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(id: TaskId, error: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
