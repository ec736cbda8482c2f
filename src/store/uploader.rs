//! Batch uploader with content-addressed deduplication
//!
//! For each downloaded resource the uploader computes the content key, asks the
//! store whether it already holds those bytes, and only uploads on a miss. A
//! conflict reported by the store means a concurrent upload of the same bytes
//! won; the key is looked up again and the winner's reference is reused.

use crate::config::PipelineConfig;
use crate::fetch::{
    run_with_retry, DownloadError, DownloadOutcome, DownloadResult, DownloadedResource,
    RetryPolicy,
};
use crate::pool::{run_bounded, Slot};
use crate::resource::ResourceTable;
use crate::store::traits::{ContentStore, ObjectMetadata, StoreError};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Longest file name kept from the original URL
const MAX_FILE_NAME_LENGTH: usize = 100;

/// Upload stage settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Maximum uploads in flight
    pub concurrency: usize,

    pub retry: RetryPolicy,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            retry: RetryPolicy::default(),
        }
    }
}

impl UploadOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.upload_concurrency,
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
                Duration::from_millis(config.retry_max_delay_ms),
            ),
        }
    }
}

/// Category of a failed upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadErrorKind {
    /// The store reported a conflict but the winning object could not be found
    DuplicateConflict,
    Rejected,
    TooLarge,
    Network,
    Timeout,
    ServerError,
    /// The upload worker itself failed
    Internal,
}

impl UploadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateConflict => "duplicate-conflict",
            Self::Rejected => "rejected",
            Self::TooLarge => "too-large",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::ServerError => "server-error",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for UploadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal upload failure for one resource
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{kind}: {message}")]
pub struct UploadError {
    pub kind: UploadErrorKind,
    pub message: String,
    pub attempts: u32,
}

impl UploadError {
    fn from_store(error: StoreError, attempts: u32) -> Self {
        let kind = match &error {
            StoreError::Conflict(_) => UploadErrorKind::DuplicateConflict,
            StoreError::Rejected(_) => UploadErrorKind::Rejected,
            StoreError::TooLarge => UploadErrorKind::TooLarge,
            StoreError::Network(_) | StoreError::NotReady(_) => UploadErrorKind::Network,
            StoreError::Timeout => UploadErrorKind::Timeout,
            StoreError::Server { .. }
            | StoreError::RateLimited { .. }
            | StoreError::Database(_)
            | StoreError::Io(_)
            | StoreError::InvalidResponse(_) => UploadErrorKind::ServerError,
        };
        Self {
            kind,
            message: error.to_string(),
            attempts,
        }
    }
}

/// A resource now held by the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredResource {
    pub new_url: String,
    pub store_id: String,

    /// The store already held these bytes; nothing was uploaded
    pub deduplicated: bool,

    pub content_key: String,

    /// Store requests made, lookups included
    pub attempts: u32,
}

/// Terminal state of one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(StoredResource),
    Failed(UploadError),
    /// Passed through from the download stage; never reached the store
    DownloadFailed(DownloadError),
    Cancelled,
}

/// Upload result for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub original_url: Url,
    pub outcome: UploadOutcome,
}

/// Computes the content key of a buffer: lowercase SHA-256 hex
///
/// # Example
///
/// ```
/// use newsletter_relocator::store::content_key;
///
/// assert_eq!(
///     content_key(b"abc"),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
pub fn content_key(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Derives a safe file name from the URL's last path segment
///
/// Characters outside `[A-Za-z0-9._-]` become `_`. An empty name falls back to
/// a prefix of the content key, and a known extension is appended if missing.
pub fn file_name_for(url: &Url, extension: &str, content_key: &str) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let mut name: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_LENGTH)
        .collect();
    name = name.trim_matches('.').to_string();

    if name.is_empty() {
        name = content_key.chars().take(16).collect();
    }

    if !extension.is_empty()
        && !name
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", extension))
    {
        name = format!("{}.{}", name, extension);
    }

    name
}

/// Moves downloaded resources into a [`ContentStore`]
pub struct Uploader {
    store: Arc<dyn ContentStore>,
    options: UploadOptions,
    table: Arc<ResourceTable>,
}

impl Uploader {
    pub fn new(store: Arc<dyn ContentStore>, options: UploadOptions, table: Arc<ResourceTable>) -> Self {
        Self {
            store,
            options,
            table,
        }
    }

    /// Uploads every successful download, at most `concurrency` at a time
    ///
    /// Failed and cancelled downloads pass straight through. Returns one result
    /// per input, in input order.
    pub async fn upload_all(
        &self,
        downloads: Vec<DownloadResult>,
        cancel: &CancellationToken,
    ) -> Vec<UploadResult> {
        let mut outcomes: Vec<Option<UploadOutcome>> = Vec::with_capacity(downloads.len());
        let mut urls = Vec::with_capacity(downloads.len());
        let mut pending = Vec::new();

        for (index, download) in downloads.into_iter().enumerate() {
            urls.push(download.url.clone());
            match download.outcome {
                DownloadOutcome::Downloaded(resource) => {
                    outcomes.push(None);
                    pending.push((index, download.url, resource));
                }
                DownloadOutcome::Failed(error) => {
                    outcomes.push(Some(UploadOutcome::DownloadFailed(error)))
                }
                DownloadOutcome::Cancelled => outcomes.push(Some(UploadOutcome::Cancelled)),
            }
        }

        tracing::info!(
            "Uploading {} resources ({} concurrent)",
            pending.len(),
            self.options.concurrency
        );

        let indices: Vec<usize> = pending.iter().map(|(index, _, _)| *index).collect();
        let slots = run_bounded(
            pending,
            self.options.concurrency,
            cancel,
            |_, (_, url, resource)| {
                let store = self.store.clone();
                let table = self.table.clone();
                let retry = self.options.retry;
                let cancel = cancel.clone();
                async move { upload_one(store.as_ref(), &table, &url, resource, &retry, &cancel).await }
            },
        )
        .await;

        for (index, slot) in indices.into_iter().zip(slots) {
            outcomes[index] = Some(match slot {
                Slot::Done(outcome) => outcome,
                Slot::Failed(message) => UploadOutcome::Failed(UploadError {
                    kind: UploadErrorKind::Internal,
                    message,
                    attempts: 1,
                }),
                Slot::Cancelled => UploadOutcome::Cancelled,
            });
        }

        urls.into_iter()
            .zip(outcomes)
            .map(|(original_url, outcome)| UploadResult {
                original_url,
                outcome: outcome.unwrap_or(UploadOutcome::Cancelled),
            })
            .collect()
    }
}

async fn upload_one(
    store: &dyn ContentStore,
    table: &ResourceTable,
    url: &Url,
    resource: DownloadedResource,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
) -> UploadOutcome {
    let key = content_key(&resource.bytes);
    let label = format!("Upload of {}", url);

    let (existing, lookups) = run_with_retry(retry, cancel, &label, |_| store.exists(&key)).await;
    match existing {
        Ok(Some(found)) => {
            tracing::debug!("{} already stored as {}", url, found.url);
            return UploadOutcome::Uploaded(StoredResource {
                new_url: found.url,
                store_id: found.id,
                deduplicated: true,
                content_key: key,
                attempts: lookups,
            });
        }
        Ok(None) => {}
        Err(e) => return failed(url, UploadError::from_store(e, lookups)),
    }

    if cancel.is_cancelled() {
        return UploadOutcome::Cancelled;
    }

    let class = table.classify(url.as_str(), resource.mime_type.as_deref());
    let mime_type = resource
        .mime_type
        .clone()
        .or_else(|| table.mime_for_extension(&class.extension).map(str::to_string))
        .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());
    let metadata = ObjectMetadata {
        content_key: key.clone(),
        original_url: url.clone(),
        file_name: file_name_for(url, &class.extension, &key),
        mime_type,
        kind: class.kind,
        extension: class.extension,
    };

    let (stored, uploads) =
        run_with_retry(retry, cancel, &label, |_| store.store(&resource.bytes, &metadata)).await;
    let attempts = lookups + uploads;

    match stored {
        Ok(stored) => {
            tracing::debug!("Uploaded {} as {}", url, stored.url);
            UploadOutcome::Uploaded(StoredResource {
                new_url: stored.url,
                store_id: stored.id,
                deduplicated: false,
                content_key: key,
                attempts,
            })
        }
        Err(StoreError::Conflict(_)) => {
            let (winner, rechecks) =
                run_with_retry(retry, cancel, &label, |_| store.exists(&key)).await;
            let attempts = attempts + rechecks;
            match winner {
                Ok(Some(winner)) => {
                    tracing::debug!("{} was stored concurrently as {}", url, winner.url);
                    UploadOutcome::Uploaded(StoredResource {
                        new_url: winner.url,
                        store_id: winner.id,
                        deduplicated: true,
                        content_key: key,
                        attempts,
                    })
                }
                Ok(None) => failed(
                    url,
                    UploadError {
                        kind: UploadErrorKind::DuplicateConflict,
                        message: format!("store reported a conflict for {} but has no such object", key),
                        attempts,
                    },
                ),
                Err(e) => failed(url, UploadError::from_store(e, attempts)),
            }
        }
        Err(e) => failed(url, UploadError::from_store(e, attempts)),
    }
}

fn failed(url: &Url, error: UploadError) -> UploadOutcome {
    tracing::warn!("Failed to upload {}: {}", url, error);
    UploadOutcome::Failed(error)
}
