/// Run stage definitions for tracking pipeline progress
///
/// A run moves strictly forward through these stages; it never revisits one.
use crate::{RelocateError, Result};
use serde::Serialize;
use std::fmt;

/// Represents the current stage of a relocation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    /// Validating the document and extracting resources
    Parsing,

    /// Fetching resources from their original hosts
    Downloading,

    /// Moving downloaded bytes into the content store
    Uploading,

    /// Substituting new URLs into the markup
    Rewriting,

    /// Terminal: the outcome is final
    Done,
}

impl RunStage {
    /// Returns true if `next` may directly follow this stage
    ///
    /// Parsing may jump straight to Done when the document holds no resources.
    pub fn can_transition_to(&self, next: RunStage) -> bool {
        matches!(
            (self, next),
            (Self::Parsing, Self::Downloading)
                | (Self::Parsing, Self::Done)
                | (Self::Downloading, Self::Uploading)
                | (Self::Uploading, Self::Rewriting)
                | (Self::Rewriting, Self::Done)
        )
    }

    /// Moves to `next`, rejecting transitions the stage order does not allow
    pub fn advance(self, next: RunStage) -> Result<RunStage> {
        if self.can_transition_to(next) {
            tracing::debug!("Run stage {} -> {}", self, next);
            Ok(next)
        } else {
            Err(RelocateError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns true if this is the terminal stage
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::Downloading => "downloading",
            Self::Uploading => "uploading",
            Self::Rewriting => "rewriting",
            Self::Done => "done",
        }
    }

    /// Returns all stages in run order
    pub fn all_stages() -> Vec<Self> {
        vec![
            Self::Parsing,
            Self::Downloading,
            Self::Uploading,
            Self::Rewriting,
            Self::Done,
        ]
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
