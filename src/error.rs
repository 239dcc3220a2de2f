use std::path::PathBuf;
use std::time::Duration;

/// Errors produced by the Remini client.
///
/// Every variant is fatal for the operation that raised it. The only
/// condition retried internally is a task that is still pending (or not yet
/// visible) while polling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No valid session could be established, even after a fresh bootstrap.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The task-creation request failed or returned a malformed response.
    #[error("task creation failed: {0}")]
    TaskCreation(String),

    /// The object-storage PUT of the source image failed.
    #[error("upload failed: {0}")]
    Upload(String),

    /// A status query returned an unexpected HTTP error.
    #[error("polling task {task_id} failed: {message}")]
    Polling { task_id: String, message: String },

    /// Polling exceeded the configured maximum wait.
    #[error("task {task_id} did not finish within {waited:?}")]
    PollingTimeout { task_id: String, waited: Duration },

    /// The service reported the task as failed, or it completed without output.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// The reprocess request failed or returned no new task id.
    #[error("reprocess failed: {0}")]
    Reprocess(String),

    /// Fetching the output artifact failed.
    #[error("download failed: {0}")]
    Download(String),

    /// Polling was aborted through the client's cancellation token.
    #[error("polling task {task_id} was cancelled")]
    Cancelled { task_id: String },

    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Transport-level failure (connection refused, TLS, timeout, bad body).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Format a non-2xx response as `"<status> - <body>"` for error messages.
pub(crate) async fn describe_response(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("{status} - {body}")
}
