use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::{Error, Result, describe_response};
use crate::session::SessionManager;
use crate::task::{FeatureRequest, TaskId};

/// Derives a new task from a completed one, reusing its uploaded source.
pub struct Reprocessor {
    session: Arc<SessionManager>,
}

impl Reprocessor {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// `POST tasks/{base}/reprocess` with `feature`; returns the new task id.
    pub async fn reprocess(&self, base: &TaskId, feature: &FeatureRequest) -> Result<TaskId> {
        let mut headers = self.session.auth_headers().await?;
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=UTF-8"),
        );

        let resp = self
            .session
            .http()
            .post(self.session.endpoint(&format!("tasks/{base}/reprocess")))
            .headers(headers)
            .timeout(self.session.request_timeout())
            .body(json!({ "feature": feature.payload() }).to_string())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Reprocess(describe_response(resp).await));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| Error::Reprocess(format!("response is not JSON: {e}")))?;

        let id = data
            .get("task_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Reprocess(format!("no new task id in response: {data}")))?;

        log::info!("Reprocessing started. New task ID: {id}");
        Ok(TaskId::new(id))
    }
}
