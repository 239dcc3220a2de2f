//! Status polling until a task reaches a terminal state.

use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result, describe_response};
use crate::session::SessionManager;
use crate::task::TaskId;

/// Task state as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    /// Not terminal yet. Carries the raw status string (may be empty).
    Pending(String),
    /// Finished. The service may complete without producing an artifact.
    Completed { output_url: Option<String> },
    /// Reported as `failed` or `error`, with the service's error payload.
    Failed { errors: Value },
}

impl TaskStatus {
    /// Interpret a status response body.
    pub fn from_response(data: &Value) -> Self {
        let status = data.get("status").and_then(Value::as_str).unwrap_or_default();
        match status {
            "completed" => Self::Completed {
                output_url: data
                    .pointer("/result/outputs/0/url")
                    .and_then(Value::as_str)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string),
            },
            "failed" | "error" => Self::Failed {
                errors: data.get("errors").cloned().unwrap_or(Value::Null),
            },
            other => Self::Pending(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending(_))
    }
}

/// How often and for how long to poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first query.
    pub interval: Duration,
    /// Growth factor of the delay after each query. `1.0` keeps it fixed.
    pub backoff_factor: f64,
    /// Ceiling for the delay.
    pub max_interval: Duration,
    /// Overall limit. `None` polls until a terminal state.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            backoff_factor: 1.0,
            max_interval: Duration::from_secs(30),
            max_wait: Some(Duration::from_secs(600)),
        }
    }
}

impl PollPolicy {
    /// The delay following `current`.
    ///
    /// Never exceeds the ceiling. A factor that is not finite or not above
    /// `1.0` keeps the delay unchanged.
    pub fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff_factor.is_nan() || self.backoff_factor <= 1.0 {
            return current;
        }
        let cap = self.max_interval.max(self.interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .map_or(cap, |next| next.min(cap))
    }
}

/// Queries task status until completion, failure, timeout, or cancellation.
pub struct StatusPoller {
    session: Arc<SessionManager>,
    policy: PollPolicy,
}

impl StatusPoller {
    pub fn new(session: Arc<SessionManager>, policy: PollPolicy) -> Self {
        Self { session, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Block until task `id` is terminal and return its output URL.
    ///
    /// Sleeps before every query. HTTP 404 means the task is not visible yet
    /// and polling continues; any other non-2xx status is [`Error::Polling`].
    /// `Ok(None)` means the task completed without an artifact.
    pub async fn await_completion(
        &self,
        id: &TaskId,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        log::info!("Polling for status of task {id}...");
        let started = Instant::now();
        let mut delay = self.policy.interval;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled { task_id: id.to_string() });
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match self.query(id).await? {
                None => log::debug!("Task {id} not found yet, continuing to poll..."),
                Some(TaskStatus::Completed { output_url }) => {
                    log::info!("Task {id} status: completed");
                    return Ok(output_url);
                }
                Some(TaskStatus::Failed { errors }) => {
                    return Err(Error::TaskFailed(format!(
                        "task {id} failed during processing: {errors}"
                    )));
                }
                Some(TaskStatus::Pending(status)) => log::info!("Task {id} status: {status}"),
            }

            if let Some(max_wait) = self.policy.max_wait {
                let waited = started.elapsed();
                if waited >= max_wait {
                    return Err(Error::PollingTimeout {
                        task_id: id.to_string(),
                        waited,
                    });
                }
            }
            delay = self.policy.next_interval(delay);
        }
    }

    /// One status query. `Ok(None)` on HTTP 404.
    async fn query(&self, id: &TaskId) -> Result<Option<TaskStatus>> {
        let headers = self.session.auth_headers().await?;
        let resp = self
            .session
            .http()
            .get(self.session.endpoint(&format!("tasks/{id}")))
            .headers(headers)
            .timeout(self.session.request_timeout())
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Error::Polling {
                task_id: id.to_string(),
                message: describe_response(resp).await,
            });
        }

        let data: Value = resp.json().await.map_err(|e| Error::Polling {
            task_id: id.to_string(),
            message: format!("status response is not JSON: {e}"),
        })?;
        Ok(Some(TaskStatus::from_response(&data)))
    }
}
