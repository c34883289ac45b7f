use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Errors raised while downloading a photo. All of them are per-photo failures.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Failed to download img {status}: {url}")]
    Status { status: StatusCode, url: String },

    #[error("Download request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to write scratch file: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches a photo to local scratch storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download `url` to a scratch file named after `media_id` and return its path
    async fn download(&self, media_id: &str, url: &str) -> Result<PathBuf, DownloadError>;
}

/// Streams photos over HTTP into a scratch directory
pub struct HttpMediaDownloader {
    http: Client,
    scratch_dir: PathBuf,
}

impl HttpMediaDownloader {
    pub fn new(scratch_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, DownloadError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            scratch_dir: scratch_dir.into(),
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}

#[async_trait]
impl MediaDownloader for HttpMediaDownloader {
    #[instrument(skip(self))]
    async fn download(&self, media_id: &str, url: &str) -> Result<PathBuf, DownloadError> {
        let resp = self.http.get(url).send().await?;

        if resp.status() != StatusCode::OK {
            return Err(DownloadError::Status {
                status: resp.status(),
                url: url.to_string(),
            });
        }

        let path = self.scratch_dir.join(sanitize_file_name(media_id));
        let mut file = File::create(&path).await?;
        let mut body = resp.bytes_stream();
        let mut size_bytes = 0usize;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            size_bytes += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(path = %path.display(), size_bytes, "Photo downloaded");

        Ok(path)
    }
}

/// Keep scratch file names inside the scratch directory
fn sanitize_file_name(media_id: &str) -> String {
    media_id
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
