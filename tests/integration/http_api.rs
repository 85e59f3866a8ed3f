//! HTTP routes, status codes and wire formats.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use distcalc::api;
use distcalc::core::ExpressionId;

use crate::fixtures::{drain, orchestrator};

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn raw_post(app: &Router, uri: &str, body: &str) -> StatusCode {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_calculate_returns_created_id() {
    let orch = orchestrator();
    let app = api::router(orch.clone());

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/calculate",
        Some(json!({"expression": "2+2*2"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id: ExpressionId = body["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(orch.expression(&id).unwrap().expression, "2+2*2");
}

#[tokio::test]
async fn test_calculate_rejects_bad_payloads() {
    let app = api::router(orchestrator());

    let (status, body) = call(&app, Method::POST, "/api/v1/calculate", Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Expression is required");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/calculate",
        Some(json!({"expression": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let status = raw_post(&app, "/api/v1/calculate", "{not json").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let status = raw_post(&app, "/api/v1/calculate", r#"{"expression": 5}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_calculate_parse_failure_is_500_and_recorded() {
    let orch = orchestrator();
    let app = api::router(orch.clone());

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/calculate",
        Some(json!({"expression": "2+*3"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("invalid token: *"));

    let (_, body) = call(&app, Method::GET, "/api/v1/expressions", None).await;
    let listed = body["expressions"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["status"], "ERROR");
    assert_eq!(listed[0]["error"], "invalid token: *");
}

#[tokio::test]
async fn test_get_expression_lifecycle() {
    let orch = orchestrator();
    let app = api::router(orch.clone());
    let id = orch.submit("(1+2)*3").unwrap();
    let uri = format!("/api/v1/expressions/{}", id);

    let (status, body) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expression"]["id"], id.to_string());
    assert_eq!(body["expression"]["status"], "COMPUTING");
    assert!(body["expression"].get("result").is_none());

    drain(&orch);

    let (_, body) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(body["expression"]["status"], "COMPLETED");
    assert_eq!(body["expression"]["result"], 9.0);
}

#[tokio::test]
async fn test_get_expression_errors() {
    let app = api::router(orchestrator());

    let (status, body) = call(&app, Method::GET, "/api/v1/expressions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Invalid expression ID");

    let uri = format!("/api/v1/expressions/{}", ExpressionId::new());
    let (status, body) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Expression not found");
}

#[tokio::test]
async fn test_list_expressions_empty() {
    let app = api::router(orchestrator());
    let (status, body) = call(&app, Method::GET, "/api/v1/expressions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"expressions": []}));
}

#[tokio::test]
async fn test_internal_task_round_trip() {
    let orch = orchestrator();
    let app = api::router(orch.clone());
    let id = orch.submit("6/4").unwrap();

    let (status, body) = call(&app, Method::GET, "/internal/task", None).await;
    assert_eq!(status, StatusCode::OK);
    let task = &body["task"];
    assert_eq!(task["arg1"], 6.0);
    assert_eq!(task["arg2"], 4.0);
    assert_eq!(task["operation"], "DIVISION");
    assert_eq!(task["operation_time"], 0);

    // Nothing else is eligible while the division is out.
    let (status, body) = call(&app, Method::GET, "/internal/task", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No tasks available");

    let (status, body) = call(
        &app,
        Method::POST,
        "/internal/task",
        Some(json!({"id": task["id"], "result": 1.5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success"}));

    let expr = orch.expression(&id).unwrap();
    assert_eq!(expr.result, Some(1.5));
}

#[tokio::test]
async fn test_internal_task_error_report() {
    let orch = orchestrator();
    let app = api::router(orch.clone());
    let id = orch.submit("1/0").unwrap();

    let (_, body) = call(&app, Method::GET, "/internal/task", None).await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/internal/task",
        Some(json!({"id": body["task"]["id"], "error": "division by zero"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, Method::GET, &format!("/api/v1/expressions/{}", id), None).await;
    assert_eq!(body["expression"]["status"], "ERROR");
    assert_eq!(body["expression"]["error"], "division by zero");
}

#[tokio::test]
async fn test_internal_task_report_errors() {
    let orch = orchestrator();
    let app = api::router(orch.clone());
    orch.submit("1+1").unwrap();
    let (_, body) = call(&app, Method::GET, "/internal/task", None).await;
    let task_id = body["task"]["id"].clone();

    let (status, body) = call(
        &app,
        Method::POST,
        "/internal/task",
        Some(json!({"id": ExpressionId::new().to_string(), "result": 2.0})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Task not found");

    let (status, _) = call(
        &app,
        Method::POST,
        "/internal/task",
        Some(json!({"id": task_id})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let status = raw_post(&app, "/internal/task", r#"{"id": "nope", "result": 1}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
