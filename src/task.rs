//! Task creation, source upload, and the processing trigger.

use base64::Engine;
use md5::{Digest, Md5};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use crate::config::TaskOptions;
use crate::device;
use crate::error::{Error, Result, describe_response};
use crate::metadata::{self, MetadataProvider};
use crate::session::SessionManager;

/// Which transform a task applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureRequest {
    /// Plain enhancement.
    Enhance,
    /// A named style pipeline (e.g. `"toon"`), run on top of an enhanced base.
    Stylize { style_id: String },
}

impl FeatureRequest {
    pub fn stylize(style_id: impl Into<String>) -> Self {
        Self::Stylize {
            style_id: style_id.into(),
        }
    }

    /// The `feature` object sent in creation and reprocess bodies.
    pub fn payload(&self) -> Value {
        match self {
            Self::Enhance => json!({ "type": "enhance", "models": [] }),
            Self::Stylize { style_id } => json!({
                "type": "stylization-v2",
                "pipelines": [{ "id": style_id }],
            }),
        }
    }
}

/// Opaque id of a remote task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the source bytes must be PUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

/// A created task whose source has not been uploaded yet.
///
/// [`TaskSubmitter::upload`] takes the handle by value, so its upload target
/// can only be used once.
#[derive(Debug, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: TaskId,
    pub upload: UploadTarget,
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    task_id: Option<String>,
    upload_url: Option<String>,
    upload_headers: Option<BTreeMap<String, Value>>,
}

impl CreateTaskResponse {
    /// All three fields must be present and non-empty.
    fn into_handle(self) -> Option<TaskHandle> {
        let id = self.task_id.filter(|s| !s.is_empty())?;
        let url = self.upload_url.filter(|s| !s.is_empty())?;
        let raw = self.upload_headers.filter(|h| !h.is_empty())?;

        let mut headers = BTreeMap::new();
        for (name, value) in raw {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            headers.insert(name, value);
        }

        Some(TaskHandle {
            id: TaskId(id),
            upload: UploadTarget { url, headers },
        })
    }
}

/// Creates tasks, uploads their source image, and starts processing.
pub struct TaskSubmitter {
    session: Arc<SessionManager>,
    options: TaskOptions,
    upload_timeout: Duration,
    metadata: Option<Arc<dyn MetadataProvider>>,
}

impl TaskSubmitter {
    pub fn new(
        session: Arc<SessionManager>,
        options: TaskOptions,
        upload_timeout: Duration,
        metadata: Option<Arc<dyn MetadataProvider>>,
    ) -> Self {
        Self {
            session,
            options,
            upload_timeout,
            metadata,
        }
    }

    /// Create a task for `path` and upload the file. Returns the task id,
    /// ready for [`trigger`](Self::trigger) and polling.
    pub async fn submit(&self, path: &Path, feature: &FeatureRequest) -> Result<TaskId> {
        let handle = self.create(path, feature).await?;
        self.upload(handle, path).await
    }

    /// `POST tasks` describing the image. The response must name the task id,
    /// the upload URL, and the upload headers.
    pub async fn create(&self, path: &Path, feature: &FeatureRequest) -> Result<TaskHandle> {
        let md5 = md5_base64(path).await?;
        let meta = metadata::gather(path, self.metadata.as_deref())?;

        let body = json!({
            "image_content_type": metadata::mime_type(path),
            "image_md5": md5,
            "feature": feature.payload(),
            "metadata": meta,
            "options": {
                "high_quality_output": self.options.high_quality_output,
                "save_input": self.options.save_input,
            },
        });

        let mut headers = self.session.auth_headers().await?;
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=UTF-8"),
        );

        let resp = self
            .session
            .http()
            .post(self.session.endpoint("tasks"))
            .headers(headers)
            .timeout(self.session.request_timeout())
            .body(body.to_string())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::TaskCreation(describe_response(resp).await));
        }

        let text = resp.text().await?;
        let parsed: CreateTaskResponse = serde_json::from_str(&text)
            .map_err(|e| Error::TaskCreation(format!("unparseable response ({e}): {text}")))?;

        let handle = parsed.into_handle().ok_or_else(|| {
            Error::TaskCreation(format!("missing required fields in task response: {text}"))
        })?;
        log::debug!("Task {} created", handle.id);
        Ok(handle)
    }

    /// PUT the raw file bytes to the task's upload target.
    pub async fn upload(&self, handle: TaskHandle, path: &Path) -> Result<TaskId> {
        let TaskHandle { id, upload } = handle;
        let bytes = tokio::fs::read(path).await?;

        let mut headers = HeaderMap::new();
        for (name, value) in &upload.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Upload(format!("invalid upload header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Upload(format!("invalid value for upload header {name}: {e}")))?;
            headers.insert(name, value);
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        headers.insert(USER_AGENT, HeaderValue::from_static(device::USER_AGENT));

        let resp = self
            .session
            .http()
            .put(&upload.url)
            .headers(headers)
            .timeout(self.upload_timeout)
            .body(bytes)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Upload(describe_response(resp).await));
        }

        log::info!("Image uploaded. Task ID: {id}");
        Ok(id)
    }

    /// `POST tasks/{id}/process` with an empty body. Safe to repeat.
    pub async fn trigger(&self, id: &TaskId) -> Result<()> {
        let mut headers = self.session.auth_headers().await?;
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));

        let resp = self
            .session
            .http()
            .post(self.session.endpoint(&format!("tasks/{id}/process")))
            .headers(headers)
            .timeout(self.session.request_timeout())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::TaskCreation(format!(
                "processing trigger for {id} failed: {}",
                describe_response(resp).await
            )));
        }
        Ok(())
    }
}

/// MD5 of the file contents, base64 encoded.
pub async fn md5_base64(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(base64::engine::general_purpose::STANDARD.encode(hasher.finalize()))
}
