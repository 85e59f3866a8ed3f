use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::api::dto::{
    CalculateRequest, CalculateResponse, ErrorResponse, ExpressionDetailResponse,
    ExpressionResponse, ExpressionsResponse, GetTaskResponse, StatusResponse, TaskResponse,
    TaskResultRequest,
};
use crate::core::ExpressionId;
use crate::orchestration::{Orchestrator, TaskReport};
use crate::{dlog_debug, dlog_error, dlog_warn, Error};

/// An error response: status code plus `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        dlog_debug!("Rejected request body: {}", rejection.body_text());
        Self::unprocessable("Invalid request payload")
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match &err {
            Error::ExpressionNotFound(_) => Self::not_found("Expression not found"),
            Error::TaskNotFound(_) => Self::not_found("Task not found"),
            Error::ExpressionRejected { source, .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to process expression: {}", source),
            ),
            _ => {
                dlog_error!("Request failed: {}", err);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

pub type AppState = Arc<Orchestrator>;

/// `POST /api/v1/calculate`
pub async fn calculate(
    State(orchestrator): State<AppState>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    if request.expression.trim().is_empty() {
        return Err(ApiError::unprocessable("Expression is required"));
    }

    let id = orchestrator.submit(&request.expression)?;
    Ok((StatusCode::CREATED, Json(CalculateResponse { id })))
}

/// `GET /api/v1/expressions`
pub async fn list_expressions(State(orchestrator): State<AppState>) -> Json<ExpressionsResponse> {
    let expressions = orchestrator
        .expressions()
        .iter()
        .map(ExpressionResponse::from)
        .collect();
    Json(ExpressionsResponse { expressions })
}

/// `GET /api/v1/expressions/{id}`
pub async fn get_expression(
    State(orchestrator): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ExpressionDetailResponse>, ApiError> {
    let id: ExpressionId = raw_id
        .parse()
        .map_err(|_| ApiError::unprocessable("Invalid expression ID"))?;
    let expression = orchestrator.expression(&id)?;
    Ok(Json(ExpressionDetailResponse {
        expression: ExpressionResponse::from(&expression),
    }))
}

/// `GET /internal/task`
pub async fn next_task(
    State(orchestrator): State<AppState>,
) -> Result<Json<GetTaskResponse>, ApiError> {
    let task = orchestrator
        .next_task()
        .ok_or_else(|| ApiError::not_found("No tasks available"))?;
    Ok(Json(GetTaskResponse {
        task: Some(TaskResponse::from(&task)),
    }))
}

/// `POST /internal/task`
pub async fn submit_task_result(
    State(orchestrator): State<AppState>,
    payload: Result<Json<TaskResultRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = payload?;
    let report = match (request.error, request.result) {
        (Some(error), _) => TaskReport::Failed(error),
        (None, Some(result)) => TaskReport::Completed(result),
        (None, None) => {
            dlog_warn!("Task {} reported without result or error", request.id.short());
            return Err(ApiError::unprocessable("Result or error is required"));
        }
    };

    orchestrator.report(&request.id, report)?;
    Ok(Json(StatusResponse {
        status: "success".to_string(),
    }))
}
