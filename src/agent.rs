//! Worker agent.
//!
//! An `Agent` runs a fixed number of workers. Each worker polls a
//! `TaskSource` for a task, waits the task's simulated operation time,
//! computes it and reports the result or the failure. An empty queue or
//! a transport error makes the worker back off for the poll interval.

use reqwest::StatusCode;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::dto::{GetTaskResponse, TaskResponse, TaskResultRequest};
use crate::config::AgentConfig;
use crate::orchestration::{Orchestrator, TaskReport};
use crate::{dlog, dlog_debug, dlog_error, dlog_trace, dlog_warn, Error, Result};

/// Where workers get tasks from and report results to.
pub trait TaskSource: Send + Sync + 'static {
    /// Fetch the next task. `Ok(None)` means nothing is eligible right now.
    fn fetch_task(&self) -> impl Future<Output = Result<Option<TaskResponse>>> + Send;

    fn send_report(&self, report: TaskResultRequest) -> impl Future<Output = Result<()>> + Send;
}

/// HTTP client for the orchestrator's internal routes.
pub struct OrchestratorClient {
    client: reqwest::Client,
    task_url: String,
}

impl OrchestratorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            task_url: format!("{}/internal/task", base_url.trim_end_matches('/')),
        })
    }
}

impl TaskSource for OrchestratorClient {
    async fn fetch_task(&self) -> Result<Option<TaskResponse>> {
        let response = self.client.get(&self.task_url).send().await?;
        match response.status() {
            StatusCode::OK => Ok(response.json::<GetTaskResponse>().await?.task),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Error::UnexpectedStatus(status.as_u16())),
        }
    }

    async fn send_report(&self, report: TaskResultRequest) -> Result<()> {
        let response = self.client.post(&self.task_url).json(&report).send().await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::TaskNotFound(report.id)),
            status => Err(Error::UnexpectedStatus(status.as_u16())),
        }
    }
}

/// Workers can also run in-process, straight against an orchestrator.
impl TaskSource for Orchestrator {
    async fn fetch_task(&self) -> Result<Option<TaskResponse>> {
        Ok(self.next_task().map(|task| TaskResponse::from(&task)))
    }

    async fn send_report(&self, report: TaskResultRequest) -> Result<()> {
        let outcome = match (report.error, report.result) {
            (Some(error), _) => TaskReport::Failed(error),
            (None, Some(result)) => TaskReport::Completed(result),
            (None, None) => {
                return Err(Error::Validation("report carries no result".to_string()))
            }
        };
        self.report(&report.id, outcome)?;
        Ok(())
    }
}

/// Compute a task the way a worker does.
pub fn compute(task: &TaskResponse) -> Result<f64> {
    task.operation.apply(task.arg1, task.arg2)
}

pub struct Agent<S> {
    source: Arc<S>,
    workers: usize,
    poll_interval: Duration,
}

impl Agent<OrchestratorClient> {
    /// Build an HTTP agent from configuration.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let client = OrchestratorClient::new(&config.orchestrator_url, config.request_timeout())?;
        Ok(Self::new(
            Arc::new(client),
            config.computing_power,
            config.poll_interval(),
        ))
    }
}

impl<S: TaskSource> Agent<S> {
    pub fn new(source: Arc<S>, workers: usize, poll_interval: Duration) -> Self {
        Self {
            source,
            workers: workers.max(1),
            poll_interval,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run all workers until `shutdown` is cancelled.
    ///
    /// A worker cancelled mid-task drops it without reporting.
    pub async fn run(&self, shutdown: CancellationToken) {
        dlog!("Starting agent with {} workers", self.workers);

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(work(
                id,
                Arc::clone(&self.source),
                self.poll_interval,
                shutdown.clone(),
            ));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                dlog_error!("Worker task failed: {}", e);
            }
        }
        dlog!("Agent stopped");
    }
}

/// Sleep for `duration` unless shutdown comes first. Returns `false` on shutdown.
async fn pause(shutdown: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

async fn work<S: TaskSource>(
    id: usize,
    source: Arc<S>,
    poll_interval: Duration,
    shutdown: CancellationToken,
) {
    dlog_debug!("Worker {} started", id);

    while !shutdown.is_cancelled() {
        let task = match source.fetch_task().await {
            Ok(Some(task)) => task,
            Ok(None) => {
                dlog_trace!("Worker {} found no task", id);
                if !pause(&shutdown, poll_interval).await {
                    break;
                }
                continue;
            }
            Err(e) => {
                dlog_warn!("Worker {} failed to fetch task: {}", id, e);
                if !pause(&shutdown, poll_interval).await {
                    break;
                }
                continue;
            }
        };

        dlog!(
            "Worker {} received task {}: {} {} {}",
            id,
            task.id.short(),
            task.arg1,
            task.operation,
            task.arg2
        );

        if !pause(&shutdown, Duration::from_millis(task.operation_time)).await {
            break;
        }

        let report = match compute(&task) {
            Ok(result) => TaskResultRequest::completed(task.id, result),
            Err(e) => {
                dlog_warn!("Worker {} task {} failed: {}", id, task.id.short(), e);
                TaskResultRequest::failed(task.id, e.to_string())
            }
        };
        let result = report.result;

        match source.send_report(report).await {
            Ok(()) => dlog!(
                "Worker {} completed task {} with result {:?}",
                id,
                task.id.short(),
                result
            ),
            Err(e) => dlog_error!(
                "Worker {} failed to report task {}: {}",
                id,
                task.id.short(),
                e
            ),
        }
    }

    dlog_debug!("Worker {} stopped", id);
}
