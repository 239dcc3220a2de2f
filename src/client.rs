//! The two public workflows, `enhance` and `stylize`.

use chrono::{Local, NaiveDateTime};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::device::DeviceIdentity;
use crate::download::ArtifactDownloader;
use crate::error::{Error, Result};
use crate::metadata::{ImageHeaderProvider, MetadataProvider};
use crate::poll::StatusPoller;
use crate::reprocess::Reprocessor;
use crate::session::SessionManager;
use crate::task::{FeatureRequest, TaskId, TaskSubmitter};
use crate::token::TokenStore;

/// Client for the Remini mobile API.
///
/// Each instance owns one device identity and one session. Workflows run as
/// strictly sequential pipelines; the only internal wait is task polling,
/// which can be aborted through [`cancellation_token`](Self::cancellation_token).
///
/// # Example
///
/// ```rust,no_run
/// use remini::{Config, Remini};
/// use std::path::Path;
///
/// # async fn example() -> remini::Result<()> {
/// let client = Remini::new(&Config::default())?;
/// let out = client.enhance(Path::new("photo.jpg"), None).await?;
/// println!("Enhanced image written to {}", out.display());
///
/// client.stylize(Path::new("photo.jpg"), "toon", Some(Path::new("toon.jpg"))).await?;
/// # Ok(())
/// # }
/// ```
pub struct Remini {
    session: Arc<SessionManager>,
    submitter: TaskSubmitter,
    poller: StatusPoller,
    reprocessor: Reprocessor,
    downloader: ArtifactDownloader,
    cancel: CancellationToken,
}

impl Remini {
    /// Build a client with a freshly generated device identity.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_identity(config, DeviceIdentity::generate())
    }

    /// Build a client around a given device identity.
    pub fn with_identity(config: &Config, identity: DeviceIdentity) -> Result<Self> {
        Self::with_parts(config, identity, Some(Arc::new(ImageHeaderProvider)))
    }

    /// Build a client with an explicit (or no) image metadata provider.
    pub fn with_parts(
        config: &Config,
        identity: DeviceIdentity,
        metadata: Option<Arc<dyn MetadataProvider>>,
    ) -> Result<Self> {
        let http = Client::builder().build()?;
        let session = Arc::new(SessionManager::new(
            http.clone(),
            config.api.clone(),
            identity,
            TokenStore::new(config.token_path()),
            Duration::from_secs(config.timeouts.request_secs),
        ));

        Ok(Self {
            submitter: TaskSubmitter::new(
                Arc::clone(&session),
                config.task.clone(),
                Duration::from_secs(config.timeouts.upload_secs),
                metadata,
            ),
            poller: StatusPoller::new(Arc::clone(&session), config.polling.policy()),
            reprocessor: Reprocessor::new(Arc::clone(&session)),
            downloader: ArtifactDownloader::new(
                http,
                Duration::from_secs(config.timeouts.download_secs),
            ),
            session,
            cancel: CancellationToken::new(),
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Token that aborts polling when cancelled. Cancellation is permanent
    /// for this client instance.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Enhance `image` and download the result to `output` (or a derived
    /// name in the current directory). Returns the written path.
    pub async fn enhance(&self, image: &Path, output: Option<&Path>) -> Result<PathBuf> {
        ensure_exists(image)?;
        self.session.ensure_authenticated().await?;

        log::info!("Submitting image for standard enhancement...");
        let task = self.run_base_task(image).await?;
        let url = self.poller.await_completion(&task, &self.cancel).await?;
        let url = url.ok_or_else(|| {
            Error::TaskFailed(format!("task {task} completed without an output URL"))
        })?;

        self.download(image, output, &url).await
    }

    /// Apply style `style_id` to `image`. Runs a base enhancement first, then
    /// reprocesses it with the style pipeline.
    pub async fn stylize(
        &self,
        image: &Path,
        style_id: &str,
        output: Option<&Path>,
    ) -> Result<PathBuf> {
        ensure_exists(image)?;
        self.session.ensure_authenticated().await?;

        log::info!("Step 1/4: Creating a base task for stylization...");
        let base = self.run_base_task(image).await?;
        let base_url = self.poller.await_completion(&base, &self.cancel).await?;
        if base_url.is_none() {
            return Err(Error::TaskFailed(format!(
                "base task {base} produced no output; cannot proceed with stylization"
            )));
        }
        log::info!("Step 2/4: Base task completed.");

        log::info!("Step 3/4: Reprocessing with '{style_id}' style...");
        let styled = self
            .reprocessor
            .reprocess(&base, &FeatureRequest::stylize(style_id))
            .await?;

        log::info!("Step 4/4: Waiting for stylization to complete...");
        let url = self.poller.await_completion(&styled, &self.cancel).await?;
        let url = url.ok_or_else(|| {
            Error::TaskFailed(format!("stylized task {styled} completed without an output URL"))
        })?;

        self.download(image, output, &url).await
    }

    /// Create, upload, and trigger an enhancement task.
    async fn run_base_task(&self, image: &Path) -> Result<TaskId> {
        let task = self.submitter.submit(image, &FeatureRequest::Enhance).await?;
        self.submitter.trigger(&task).await?;
        Ok(task)
    }

    async fn download(&self, image: &Path, output: Option<&Path>, url: &str) -> Result<PathBuf> {
        let dest = match output {
            Some(p) => p.to_path_buf(),
            None => next_free_path(&default_output_path(image, Local::now().naive_local())),
        };
        log::info!("Downloading enhanced image to: {}", dest.display());
        self.downloader.fetch(url, &dest).await?;
        log::info!("Download finished successfully.");
        Ok(dest)
    }
}

fn ensure_exists(image: &Path) -> Result<()> {
    if image.is_file() {
        Ok(())
    } else {
        Err(Error::InputNotFound(image.to_path_buf()))
    }
}

/// `{stem}_enhanced_{YYYYmmdd_HHMMSS}{.ext}`, relative to the current directory.
pub fn default_output_path(input: &Path, now: NaiveDateTime) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    PathBuf::from(format!(
        "{stem}_enhanced_{}{ext}",
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// `path` itself if nothing exists there, else the first free `{stem}_{n}{.ext}`.
pub fn next_free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (1u32..)
        .map(|n| path.with_file_name(format!("{stem}_{n}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}
