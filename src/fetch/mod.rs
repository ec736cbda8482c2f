//! Resource downloading
//!
//! This module turns resolved resource URLs into in-memory buffers:
//! - [`Fetcher`]: the injectable fetch collaborator, with [`HttpFetcher`] as the
//!   reqwest-backed implementation
//! - [`Downloader`]: bounded-concurrency batch downloads with per-request
//!   timeouts, retry with exponential backoff and a payload ceiling
//! - [`retry`]: the backoff policy shared with the upload stage

mod downloader;
mod fetcher;
pub mod retry;

pub use downloader::{
    DownloadError, DownloadErrorKind, DownloadOptions, DownloadOutcome, DownloadResult,
    DownloadedResource, Downloader,
};
pub use fetcher::{build_http_client, user_agent_string, FetchError, FetchedBody, Fetcher, HttpFetcher};
pub use retry::{run_with_retry, RetryPolicy, Transient};
