//! Content store trait and error types
//!
//! This module defines the interface the uploader speaks to and the error
//! taxonomy every store implementation maps its failures onto.

use crate::fetch::Transient;
use crate::resource::ResourceKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during content store operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Content key already exists: {0}")]
    Conflict(String),

    #[error("Rejected by store: {0}")]
    Rejected(String),

    #[error("Object exceeds the store's size limit")]
    TooLarge,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Rate limited by store")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Store not ready: {0}")]
    NotReady(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::Server { .. } | Self::RateLimited { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for content store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A stable reference to a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRef {
    /// Store-assigned identifier
    pub id: String,

    /// Public URL the newsletter should link to
    pub url: String,
}

/// Descriptive fields sent along with an object's bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// SHA-256 hex of the bytes
    pub content_key: String,
    pub original_url: Url,
    /// Sanitized file name, extension included when known
    pub file_name: String,
    pub mime_type: String,
    pub kind: ResourceKind,
    pub extension: String,
}

/// Trait for content store implementations
///
/// Implementations must be safe to call concurrently. Storing a key that
/// already exists reports [`StoreError::Conflict`] rather than overwriting.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Looks up an object by content key
    async fn exists(&self, content_key: &str) -> StoreResult<Option<StoreRef>>;

    /// Stores an object's bytes and returns its reference
    async fn store(&self, bytes: &[u8], metadata: &ObjectMetadata) -> StoreResult<StoreRef>;
}
