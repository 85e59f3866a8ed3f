//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Building orchestrators with instant operation times
//! - Draining the task queue like a worker would
//! - Starting an HTTP server on an ephemeral port

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use distcalc::calc::OperationTimes;
use distcalc::core::{Expression, ExpressionId};
use distcalc::orchestration::Orchestrator;

/// Expressions with their expected values.
pub const ARITHMETIC_CASES: &[(&str, f64)] = &[
    ("2+3*4", 14.0),
    ("(2+3)*4", 20.0),
    ("10/2-3", 2.0),
    ("42", 42.0),
    ("1-2-3", -4.0),
    ("2*(3+4)*5", 70.0),
    ("((1.5+2.5)*2)/4", 2.0),
    ("100/10/5", 2.0),
];

pub fn orchestrator() -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(OperationTimes::instant()))
}

/// Compute one task and report it. Returns `false` when nothing was eligible.
pub fn work_one(orchestrator: &Orchestrator) -> bool {
    let Some(task) = orchestrator.next_task() else {
        return false;
    };
    let (arg1, arg2) = task
        .operand_values()
        .expect("dispatched task has operand values");
    let reported = match task.operation.apply(arg1, arg2) {
        Ok(value) => orchestrator.submit_result(&task.id, value),
        Err(e) => orchestrator.fail_task(&task.id, &e.to_string()),
    };
    reported.expect("report accepted");
    true
}

/// Work until no task is eligible.
pub fn drain(orchestrator: &Orchestrator) -> usize {
    let mut count = 0;
    while work_one(orchestrator) {
        count += 1;
    }
    count
}

/// Poll until the expression is Completed or Error.
pub async fn wait_until_resolved(
    orchestrator: &Orchestrator,
    id: &ExpressionId,
    timeout: Duration,
) -> Expression {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let expression = orchestrator.expression(id).expect("expression exists");
        if expression.status.is_terminal() {
            return expression;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "expression {} not resolved within {:?}: {:?}",
            id,
            timeout,
            expression.status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// A live API server on an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub orchestrator: Arc<Orchestrator>,
    pub shutdown: CancellationToken,
    handle: JoinHandle<distcalc::Result<()>>,
}

impl TestServer {
    pub async fn start(orchestrator: Arc<Orchestrator>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(distcalc::api::serve_on(
            listener,
            Arc::clone(&orchestrator),
            shutdown.clone(),
        ));
        Self {
            addr,
            orchestrator,
            shutdown,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.handle
            .await
            .expect("server task joins")
            .expect("server exits cleanly");
    }
}
