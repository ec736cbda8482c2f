//! Batch downloader
//!
//! Every input URL yields exactly one [`DownloadResult`], in input order. Fetches
//! run on the shared bounded pool; each attempt has its own timeout and the
//! whole sequence of attempts follows the stage's [`RetryPolicy`].

use crate::config::PipelineConfig;
use crate::fetch::fetcher::{FetchError, Fetcher};
use crate::fetch::retry::{run_with_retry, RetryPolicy};
use crate::pool::{run_bounded, Slot};
use crate::{RelocateError, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Download stage settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Maximum fetches in flight
    pub concurrency: usize,

    /// Timeout for a single attempt
    pub timeout: Duration,

    /// Largest accepted body, in bytes
    pub max_payload_bytes: u64,

    pub retry: RetryPolicy,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            timeout: Duration::from_secs(30),
            max_payload_bytes: 50 * 1024 * 1024,
            retry: RetryPolicy::default(),
        }
    }
}

impl DownloadOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.download_concurrency,
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_payload_bytes: config.max_payload_bytes,
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
                Duration::from_millis(config.retry_max_delay_ms),
            ),
        }
    }
}

/// Category of a failed download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadErrorKind {
    Timeout,
    HttpStatus,
    Network,
    TooLarge,
    /// The download worker itself failed
    Internal,
}

impl DownloadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::HttpStatus => "http-status",
            Self::Network => "network",
            Self::TooLarge => "too-large",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for DownloadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal download failure for one resource
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{kind}: {message}")]
pub struct DownloadError {
    pub kind: DownloadErrorKind,
    pub message: String,

    /// HTTP status, for `http-status` failures
    #[serde(rename = "status_code")]
    pub status: Option<u16>,

    /// Attempts made before giving up
    pub attempts: u32,
}

impl DownloadError {
    fn from_fetch(error: FetchError, attempts: u32) -> Self {
        let (kind, status) = match &error {
            FetchError::Timeout => (DownloadErrorKind::Timeout, None),
            FetchError::HttpStatus { status, .. } => (DownloadErrorKind::HttpStatus, Some(*status)),
            FetchError::Network(_) => (DownloadErrorKind::Network, None),
            FetchError::TooLarge { .. } => (DownloadErrorKind::TooLarge, None),
        };
        Self {
            kind,
            message: error.to_string(),
            status,
            attempts,
        }
    }

    fn worker_failed(message: String) -> Self {
        Self {
            kind: DownloadErrorKind::Internal,
            message,
            status: None,
            attempts: 1,
        }
    }
}

/// A successfully downloaded resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedResource {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
    pub byte_size: u64,
    pub attempts: u32,
}

/// Terminal state of one download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded(DownloadedResource),
    Failed(DownloadError),
    /// Never attempted because the run was cancelled
    Cancelled,
}

/// Download result for one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub url: Url,
    pub outcome: DownloadOutcome,
}

impl DownloadResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Downloaded(_))
    }
}

/// Fetches batches of resources through a [`Fetcher`]
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    options: DownloadOptions,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: DownloadOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Downloads every URL, at most `concurrency` at a time
    ///
    /// # Arguments
    ///
    /// * `urls` - Resolved resource URLs, already deduplicated
    /// * `cancel` - Once cancelled, no new request is issued
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<DownloadResult>)` - One result per input URL, in input order
    /// * `Err(RelocateError::EmptyBatch)` - `urls` was empty
    pub async fn download_all(
        &self,
        urls: Vec<Url>,
        cancel: &CancellationToken,
    ) -> Result<Vec<DownloadResult>> {
        if urls.is_empty() {
            return Err(RelocateError::EmptyBatch { stage: "download" });
        }

        tracing::info!(
            "Downloading {} resources ({} concurrent)",
            urls.len(),
            self.options.concurrency
        );

        let slots = run_bounded(urls.clone(), self.options.concurrency, cancel, |_, url| {
            let fetcher = self.fetcher.clone();
            let options = self.options.clone();
            let cancel = cancel.clone();
            async move { download_one(fetcher.as_ref(), &url, &options, &cancel).await }
        })
        .await;

        Ok(urls
            .into_iter()
            .zip(slots)
            .map(|(url, slot)| {
                let outcome = match slot {
                    Slot::Done(outcome) => outcome,
                    Slot::Failed(message) => {
                        DownloadOutcome::Failed(DownloadError::worker_failed(message))
                    }
                    Slot::Cancelled => DownloadOutcome::Cancelled,
                };
                DownloadResult { url, outcome }
            })
            .collect())
    }
}

async fn download_one(
    fetcher: &dyn Fetcher,
    url: &Url,
    options: &DownloadOptions,
    cancel: &CancellationToken,
) -> DownloadOutcome {
    let label = format!("Download of {}", url);
    let (result, attempts) = run_with_retry(&options.retry, cancel, &label, |_| {
        fetcher.fetch(url, options.timeout, options.max_payload_bytes)
    })
    .await;

    match result {
        Ok(body) => {
            let byte_size = body.bytes.len() as u64;
            tracing::debug!("Downloaded {} ({} bytes, {} attempts)", url, byte_size, attempts);
            DownloadOutcome::Downloaded(DownloadedResource {
                bytes: body.bytes,
                mime_type: body.mime_type,
                byte_size,
                attempts,
            })
        }
        Err(e) => {
            let error = DownloadError::from_fetch(e, attempts);
            tracing::warn!("Failed to download {}: {}", url, error);
            DownloadOutcome::Failed(error)
        }
    }
}
