//! Download finished videos to disk

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::domain::{WorkItem, WorkItemId, WorkStatus};

/// Host whose download links need the API key attached
const GEMINI_HOST: &str = "generativelanguage.googleapis.com";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No successful videos to download.")]
    NoSuccessfulItems,

    #[error("Download failed with status {status}: {uri}")]
    Http { status: u16, uri: String },

    #[error("Unsupported artifact URI: {0}")]
    UnsupportedUri(String),

    #[error("Network error: {0}")]
    Network(reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ExportError {
    /// The request URL may carry the API key, so it never reaches the message
    fn from(e: reqwest::Error) -> Self {
        ExportError::Network(e.without_url())
    }
}

/// Outcome of an export run
#[derive(Debug, Default)]
pub struct ExportReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<(WorkItemId, String)>,
}

pub struct Exporter {
    http: Client,
    output_dir: PathBuf,
    stagger: Duration,
    api_key: Option<String>,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>, config: &ExportConfig, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            output_dir: output_dir.into(),
            stagger: Duration::from_millis(config.stagger_ms),
            api_key,
        }
    }

    /// File name for an item's video
    pub fn file_name(id: &WorkItemId) -> String {
        format!("video_{}.mp4", id)
    }

    /// URL to fetch, with the API key attached for Gemini file links
    fn download_url(&self, uri: &str) -> String {
        match &self.api_key {
            Some(key) if uri.contains(GEMINI_HOST) => {
                let sep = if uri.contains('?') { '&' } else { '?' };
                format!("{}{}key={}", uri, sep, key)
            }
            _ => uri.to_string(),
        }
    }

    /// Download every succeeded item, pausing between downloads
    ///
    /// Individual failures are recorded in the report; only "nothing to
    /// export" and an unusable output directory are errors.
    pub async fn export_all(&self, items: &[WorkItem]) -> Result<ExportReport, ExportError> {
        debug!(count = items.len(), dir = %self.output_dir.display(), "Exporter::export_all: called");
        let ready: Vec<_> = items
            .iter()
            .filter(|item| item.status() == WorkStatus::Succeeded)
            .filter_map(|item| item.result().map(|artifact| (item.id, artifact)))
            .collect();
        if ready.is_empty() {
            return Err(ExportError::NoSuccessfulItems);
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut report = ExportReport::default();
        for (i, (id, artifact)) in ready.into_iter().enumerate() {
            if i > 0 && !self.stagger.is_zero() {
                tokio::time::sleep(self.stagger).await;
            }
            let path = self.output_dir.join(Self::file_name(&id));
            match self.download(&artifact.uri, &path).await {
                Ok(bytes) => {
                    info!(%id, path = %path.display(), bytes, "Saved video");
                    report.saved.push(path);
                }
                Err(e) => {
                    warn!(%id, error = %e, "Failed to save video");
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Save one artifact at `path`, returning the number of bytes written
    ///
    /// Data lands in a `.part` file that is renamed once complete, so a
    /// failed download never leaves a truncated video behind.
    async fn download(&self, uri: &str, path: &Path) -> Result<u64, ExportError> {
        debug!(%uri, path = %path.display(), "Exporter::download: called");
        let partial = partial_path(path);
        match self.fetch(uri, &partial).await {
            Ok(written) => {
                tokio::fs::rename(&partial, path).await?;
                Ok(written)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&partial).await
                    && rm.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(path = %partial.display(), error = %rm, "Failed to remove partial download");
                }
                Err(e)
            }
        }
    }

    async fn fetch(&self, uri: &str, dest: &Path) -> Result<u64, ExportError> {
        if let Some(local) = uri.strip_prefix("file://") {
            return Ok(tokio::fs::copy(local, dest).await?);
        }
        if !uri.starts_with("http://") && !uri.starts_with("https://") {
            return Err(ExportError::UnsupportedUri(uri.to_string()));
        }

        let response = self.http.get(self.download_url(uri)).send().await?;
        if !response.status().is_success() {
            return Err(ExportError::Http {
                status: response.status().as_u16(),
                uri: uri.to_string(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// `video_<id>.mp4` -> `video_<id>.mp4.part`
fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
