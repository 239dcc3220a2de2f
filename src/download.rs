use reqwest::Client;
use reqwest::header::{HeaderValue, USER_AGENT};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::device;
use crate::error::{Error, Result, describe_response};

/// Streams output artifacts to disk.
pub struct ArtifactDownloader {
    http: Client,
    timeout: Duration,
}

impl ArtifactDownloader {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Fetch `url` into `dest`, chunk by chunk. Returns the byte count.
    ///
    /// A partially written file is removed if the transfer fails. Nothing is
    /// touched when `dest` cannot be opened for writing.
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, HeaderValue::from_static(device::USER_AGENT))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Download(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Download(describe_response(resp).await));
        }

        let file = tokio::fs::File::create(dest).await.map_err(|e| {
            Error::Download(format!("cannot create {}: {e}", dest.display()))
        })?;

        match write_body(resp, file).await {
            Ok(written) => {
                log::debug!("Wrote {written} bytes to {}", dest.display());
                Ok(written)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(dest).await {
                    log::debug!("Could not remove partial file {}: {rm}", dest.display());
                }
                Err(e)
            }
        }
    }
}

async fn write_body(mut resp: reqwest::Response, mut file: tokio::fs::File) -> Result<u64> {
    let mut written = 0u64;
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| Error::Download(format!("body stream interrupted: {e}")))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::Download(format!("write failed after {written} bytes: {e}")))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| Error::Download(format!("flush failed: {e}")))?;
    Ok(written)
}
