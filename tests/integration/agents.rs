//! Worker agents against a live orchestrator server.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use distcalc::agent::{Agent, OrchestratorClient, TaskSource};
use distcalc::api::dto::TaskResultRequest;
use distcalc::calc::OperationTimes;
use distcalc::config::AgentConfig;
use distcalc::core::{ExpressionStatus, TaskId};
use distcalc::orchestration::Orchestrator;
use distcalc::Error;

use crate::fixtures::{orchestrator, wait_until_resolved, TestServer, ARITHMETIC_CASES};

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

fn agent_config(server: &TestServer, workers: usize) -> AgentConfig {
    AgentConfig {
        orchestrator_url: server.url(),
        computing_power: workers,
        poll_interval_ms: 10,
        request_timeout_ms: 2_000,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_http_agent_evaluates_expressions() {
    let server = TestServer::start(orchestrator()).await;
    let ids: Vec<_> = ARITHMETIC_CASES
        .iter()
        .map(|(text, _)| server.orchestrator.submit(text).unwrap())
        .collect();

    let agent = Agent::from_config(&agent_config(&server, 3)).unwrap();
    let shutdown = CancellationToken::new();
    let running = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { agent.run(shutdown).await })
    };

    for (id, (text, expected)) in ids.iter().zip(ARITHMETIC_CASES) {
        let expr = wait_until_resolved(&server.orchestrator, id, RESOLVE_TIMEOUT).await;
        assert_eq!(expr.status, ExpressionStatus::Completed, "{}", text);
        assert_eq!(expr.result, Some(*expected), "{}", text);
    }

    shutdown.cancel();
    running.await.unwrap();
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_http_agent_reports_division_by_zero() {
    let server = TestServer::start(orchestrator()).await;
    let id = server.orchestrator.submit("8/(4-2*2)").unwrap();

    let agent = Agent::from_config(&agent_config(&server, 2)).unwrap();
    let shutdown = CancellationToken::new();
    let running = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { agent.run(shutdown).await })
    };

    let expr = wait_until_resolved(&server.orchestrator, &id, RESOLVE_TIMEOUT).await;
    assert_eq!(expr.status, ExpressionStatus::Error);
    assert_eq!(expr.error.as_deref(), Some("division by zero"));

    shutdown.cancel();
    running.await.unwrap();
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_honors_operation_time() {
    let times = OperationTimes {
        addition_ms: 150,
        ..OperationTimes::instant()
    };
    let server = TestServer::start(Arc::new(Orchestrator::new(times))).await;
    let id = server.orchestrator.submit("1+1").unwrap();

    let agent = Agent::from_config(&agent_config(&server, 1)).unwrap();
    let shutdown = CancellationToken::new();
    let started = tokio::time::Instant::now();
    let running = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { agent.run(shutdown).await })
    };

    let expr = wait_until_resolved(&server.orchestrator, &id, RESOLVE_TIMEOUT).await;
    assert_eq!(expr.result, Some(2.0));
    assert!(started.elapsed() >= Duration::from_millis(150));

    shutdown.cancel();
    running.await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_client_against_empty_server() {
    let server = TestServer::start(orchestrator()).await;
    let client = OrchestratorClient::new(&server.url(), Duration::from_secs(2)).unwrap();

    assert!(client.fetch_task().await.unwrap().is_none());

    let err = client
        .send_report(TaskResultRequest::completed(TaskId::new(), 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));

    server.stop().await;
}

#[tokio::test]
async fn test_client_unreachable_server_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        OrchestratorClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    assert!(matches!(client.fetch_task().await, Err(Error::Http(_))));
}
