//! Aggregate result of a relocation run

use crate::extract::{ExtractionError, ResourceOccurrence};
use crate::fetch::DownloadError;
use crate::resource::ResourceKind;
use crate::rewrite::ReplaceError;
use crate::store::{UploadError, UploadOutcome};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;
use url::Url;

/// Why a resource was not relocated, by the stage that gave up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum ResourceFailure {
    Download(DownloadError),
    Upload(UploadError),
    Replace(ReplaceError),
}

impl ResourceFailure {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Download(_) => "download",
            Self::Upload(_) => "upload",
            Self::Replace(_) => "replace",
        }
    }

    /// The error kind, e.g. `http-status` or `rejected`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Download(e) => e.kind.as_str(),
            Self::Upload(e) => e.kind.as_str(),
            Self::Replace(e) => e.kind.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Download(e) => &e.message,
            Self::Upload(e) => &e.message,
            Self::Replace(e) => &e.message,
        }
    }
}

/// Terminal status of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResourceStatus {
    Succeeded {
        new_url: String,
        store_id: String,
        deduplicated: bool,
    },
    Failed(ResourceFailure),
    Cancelled,
}

impl ResourceStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<UploadOutcome> for ResourceStatus {
    fn from(outcome: UploadOutcome) -> Self {
        match outcome {
            UploadOutcome::Uploaded(stored) => Self::Succeeded {
                new_url: stored.new_url,
                store_id: stored.store_id,
                deduplicated: stored.deduplicated,
            },
            UploadOutcome::Failed(e) => Self::Failed(ResourceFailure::Upload(e)),
            UploadOutcome::DownloadFailed(e) => Self::Failed(ResourceFailure::Download(e)),
            UploadOutcome::Cancelled => Self::Cancelled,
        }
    }
}

/// One resource's line in the outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    pub resolved_url: Url,
    pub source_url: String,
    pub kind: ResourceKind,
    /// Where the first occurrence was found, e.g. `a/href`
    pub element: String,
    /// Later references folded into this one
    pub duplicates: usize,
    #[serde(flatten)]
    pub status: ResourceStatus,
}

impl ResourceReport {
    pub fn new(occurrence: &ResourceOccurrence, status: ResourceStatus) -> Self {
        Self {
            resolved_url: occurrence.resolved_url.clone(),
            source_url: occurrence.source_url.clone(),
            kind: occurrence.kind,
            element: occurrence.element.to_string(),
            duplicates: occurrence.duplicates,
            status,
        }
    }

    /// Turns a success into a `replace` failure when no reference was rewritten
    pub fn mark_not_rewritten(&mut self) {
        if let ResourceStatus::Succeeded { new_url, .. } = &self.status {
            tracing::warn!("{} was stored at {} but not rewritten", self.resolved_url, new_url);
            let error = ReplaceError::not_rewritten(new_url.clone());
            self.status = ResourceStatus::Failed(ResourceFailure::Replace(error));
        }
    }
}

/// Per-status resource totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Successes served from content already in the store
    pub deduplicated: usize,
}

impl OutcomeCounts {
    pub fn from_resources(resources: &[ResourceReport]) -> Self {
        let mut counts = Self {
            total: resources.len(),
            ..Self::default()
        };
        for resource in resources {
            match &resource.status {
                ResourceStatus::Succeeded { deduplicated, .. } => {
                    counts.succeeded += 1;
                    if *deduplicated {
                        counts.deduplicated += 1;
                    }
                }
                ResourceStatus::Failed(_) => counts.failed += 1,
                ResourceStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    /// The rewritten document; identical to the input when nothing was relocated
    pub final_html: String,

    pub base_url: Url,

    /// Every discovered resource in document order
    pub resources: Vec<ResourceReport>,

    pub extraction_errors: Vec<ExtractionError>,

    /// Mapped URLs the rewriter found no position for
    pub replacement_skips: Vec<String>,

    pub counts: OutcomeCounts,

    pub started_at: DateTime<Utc>,

    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,

    /// The run was cancelled or hit its deadline
    pub cancelled: bool,
}

impl ProcessingOutcome {
    /// Looks up a resource's status by resolved URL
    pub fn status_of(&self, resolved_url: &str) -> Option<&ResourceStatus> {
        self.resources
            .iter()
            .find(|r| r.resolved_url.as_str() == resolved_url)
            .map(|r| &r.status)
    }

    /// Resources that did not succeed
    pub fn failures(&self) -> impl Iterator<Item = (&ResourceReport, &ResourceFailure)> {
        self.resources.iter().filter_map(|r| match &r.status {
            ResourceStatus::Failed(failure) => Some((r, failure)),
            _ => None,
        })
    }

    /// Returns true if every resource was relocated
    pub fn is_complete(&self) -> bool {
        self.counts.succeeded == self.counts.total
    }
}

fn serialize_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}
