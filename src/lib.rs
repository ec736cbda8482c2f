//! Newsletter Relocator: moves externally hosted newsletter resources into a managed store
//!
//! This crate implements the resource-processing pipeline that takes an HTML newsletter,
//! discovers the downloadable documents and images it links to, copies them into a
//! managed content store, and rewrites only those references in the markup.
//!
//! The stages, leaves first:
//! - [`resource`]: classification and validation of resource URLs
//! - [`extract`]: discovery of resource occurrences in markup
//! - [`fetch`]: bounded, retrying downloads
//! - [`store`]: deduplicating uploads to a content store
//! - [`rewrite`]: occurrence-scoped URL substitution
//! - [`pipeline`]: the orchestrator that sequences the stages

pub mod config;
pub mod extract;
pub mod fetch;
pub mod markup;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod resource;
pub mod rewrite;
pub mod store;

use thiserror::Error;

/// Main error type for relocation runs
///
/// Per-resource problems never surface here; they are recorded in the
/// [`pipeline::ProcessingOutcome`]. Only document-level and setup failures do.
#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Nothing to {stage}: the batch is empty")]
    EmptyBatch { stage: &'static str },

    #[error("Content store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid stage transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: pipeline::RunStage,
        to: pipeline::RunStage,
    },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Document-level failures, the only errors fatal to a whole run
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document is empty")]
    Empty,

    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// URL resolution errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingDomain,
}

/// Result type alias for relocation operations
pub type Result<T> = std::result::Result<T, RelocateError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{extract, ExtractOptions, ResourceOccurrence};
pub use pipeline::{Pipeline, ProcessingOutcome, ResourceStatus, RunStage};
pub use resource::{classify, validate, ResourceKind, ResourceTable};
pub use rewrite::{replace, UrlMappings};
