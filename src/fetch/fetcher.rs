//! HTTP fetcher implementation
//!
//! This module handles the network side of downloading, including:
//! - Building the HTTP client with a descriptive user agent string
//! - Streaming response bodies under a payload ceiling
//! - Mapping responses and transport failures onto [`FetchError`]

use crate::config::UserAgentConfig;
use crate::fetch::retry::{parse_retry_after, Transient};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed for one resource
const MAX_REDIRECTS: usize = 10;

/// A fully received response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,

    /// Media type from `Content-Type`, lowercase and without parameters
    pub mime_type: Option<String>,
}

/// Why a single fetch attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {status}")]
    HttpStatus {
        status: u16,
        /// Parsed `Retry-After`, if the server sent one
        retry_after: Option<Duration>,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("payload exceeds {limit} bytes")]
    TooLarge {
        limit: u64,
        /// Declared length, when the server announced one
        actual: Option<u64>,
    },
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::TooLarge { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::HttpStatus { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Fetch collaborator used by the [`Downloader`](crate::fetch::Downloader)
///
/// Implementations perform exactly one attempt; retry is the caller's concern.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, failing if it takes longer than `timeout` or the body
    /// exceeds `max_bytes`
    async fn fetch(
        &self,
        url: &Url,
        timeout: Duration,
        max_bytes: u64,
    ) -> Result<FetchedBody, FetchError>;
}

/// Formats the user agent: `Name/Version (+ContactURL)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!("{}/{} (+{})", config.name, config.version, config.contact_url)
}

/// Builds an HTTP client with proper configuration
///
/// Per-request timeouts are applied by the fetcher, so the client itself only
/// bounds connection setup.
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use newsletter_relocator::config::UserAgentConfig;
/// use newsletter_relocator::fetch::build_http_client;
///
/// let config = UserAgentConfig {
///     name: "NewsletterRelocator".to_string(),
///     version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`Fetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a fetcher with a client configured from `config`
    pub fn from_config(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }

    async fn fetch_inner(&self, url: &Url, max_bytes: u64) -> Result<FetchedBody, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                retry_after: header_value(&response, RETRY_AFTER.as_str())
                    .and_then(|v| parse_retry_after(&v, Utc::now())),
            });
        }

        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(FetchError::TooLarge {
                    limit: max_bytes,
                    actual: Some(length),
                });
            }
        }

        let mime_type = header_value(&response, CONTENT_TYPE.as_str()).and_then(|v| {
            let essence = v.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            (!essence.is_empty()).then_some(essence)
        });

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify_error)? {
            if (bytes.len() + chunk.len()) as u64 > max_bytes {
                return Err(FetchError::TooLarge {
                    limit: max_bytes,
                    actual: None,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedBody { bytes, mime_type })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &Url,
        timeout: Duration,
        max_bytes: u64,
    ) -> Result<FetchedBody, FetchError> {
        tokio::time::timeout(timeout, self.fetch_inner(url, max_bytes))
            .await
            .unwrap_or(Err(FetchError::Timeout))
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Maps a transport error onto the fetch taxonomy
fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Network(format!("connection failed: {}", e))
    } else {
        FetchError::Network(e.to_string())
    }
}
