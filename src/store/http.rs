//! Remote content store over HTTP
//!
//! # Protocol
//!
//! | Request | Response |
//! |---------|----------|
//! | `GET {endpoint}/health` | 2xx when ready |
//! | `GET {endpoint}/objects?content_key=KEY` | 200 `{"id","url"}` or 404 |
//! | `POST {endpoint}/objects` (multipart) | 200/201 `{"id","url"}` |
//!
//! Upload failures map as: 409 conflict, 413 too large, 429 rate limited,
//! 5xx server error, any other status rejected.

use crate::fetch::retry::parse_retry_after;
use crate::store::traits::{ContentStore, ObjectMetadata, StoreError, StoreRef, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::RETRY_AFTER;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio::time::Instant;

/// Longest pause between health checks
const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// Connection settings for an HTTP store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStoreOptions {
    /// Base URL of the store API, without a trailing slash
    pub endpoint: String,

    /// Bearer token sent with every request
    pub token: Option<String>,

    /// How long `connect` waits for the store to report ready
    pub connect_timeout: Duration,

    /// Timeout for a single API request
    pub request_timeout: Duration,
}

/// [`ContentStore`] backed by a remote HTTP API
#[derive(Debug, Clone)]
pub struct HttpContentStore {
    client: Client,
    options: HttpStoreOptions,
}

impl HttpContentStore {
    /// Connects to the store, waiting until it reports ready
    ///
    /// Polls `GET {endpoint}/health` with growing pauses until it answers 2xx
    /// or `connect_timeout` elapses.
    ///
    /// # Returns
    ///
    /// * `Ok(HttpContentStore)` - The store answered its health check
    /// * `Err(StoreError::NotReady)` - It did not do so in time
    pub async fn connect(client: Client, mut options: HttpStoreOptions) -> StoreResult<Self> {
        options.endpoint = options.endpoint.trim_end_matches('/').to_string();
        let store = Self { client, options };

        let deadline = Instant::now() + store.options.connect_timeout;
        let mut interval = Duration::from_millis(100);
        let mut checks = 0u32;

        loop {
            checks += 1;
            let reason = match store.check_health().await {
                Ok(()) => {
                    tracing::info!(
                        "Content store at {} is ready ({} checks)",
                        store.options.endpoint,
                        checks
                    );
                    return Ok(store);
                }
                Err(reason) => reason,
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::NotReady(format!(
                    "{} after {} checks: {}",
                    store.options.endpoint, checks, reason
                )));
            }

            tracing::debug!("Content store not ready yet: {}", reason);
            tokio::time::sleep(interval.min(deadline - now)).await;
            interval = (interval * 2).min(MAX_CHECK_INTERVAL);
        }
    }

    async fn check_health(&self) -> Result<(), String> {
        let response = self
            .authorized(self.client.get(self.url("health")))
            .timeout(self.options.request_timeout.min(self.options.connect_timeout))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("health check returned {}", response.status()))
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.options.endpoint, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.options.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn exists(&self, content_key: &str) -> StoreResult<Option<StoreRef>> {
        let response = self
            .authorized(self.client.get(self.url("objects")))
            .query(&[("content_key", content_key)])
            .timeout(self.options.request_timeout)
            .send()
            .await
            .map_err(classify_error)?;

        match response.status() {
            StatusCode::OK => Ok(Some(parse_ref(response).await?)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(status_error(response).await),
        }
    }

    async fn store(&self, bytes: &[u8], metadata: &ObjectMetadata) -> StoreResult<StoreRef> {
        let file = Part::bytes(bytes.to_vec())
            .file_name(metadata.file_name.clone())
            .mime_str(&metadata.mime_type)
            .map_err(|e| StoreError::Rejected(format!("invalid MIME type: {}", e)))?;

        let form = Form::new()
            .part("file", file)
            .text("content_key", metadata.content_key.clone())
            .text("original_url", metadata.original_url.to_string())
            .text("mime_type", metadata.mime_type.clone())
            .text("kind", metadata.kind.as_str());

        let response = self
            .authorized(self.client.post(self.url("objects")))
            .multipart(form)
            .timeout(self.options.request_timeout)
            .send()
            .await
            .map_err(classify_error)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => parse_ref(response).await,
            StatusCode::CONFLICT => Err(StoreError::Conflict(metadata.content_key.clone())),
            _ => Err(status_error(response).await),
        }
    }
}

async fn parse_ref(response: Response) -> StoreResult<StoreRef> {
    response
        .json::<StoreRef>()
        .await
        .map_err(|e| StoreError::InvalidResponse(e.to_string()))
}

/// Maps an unexpected status onto the store error taxonomy
async fn status_error(response: Response) -> StoreError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()));
    let message = response.text().await.unwrap_or_default();

    match status {
        StatusCode::PAYLOAD_TOO_LARGE => StoreError::TooLarge,
        StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited { retry_after },
        s if s.is_server_error() => StoreError::Server {
            status: s.as_u16(),
            message,
        },
        s => StoreError::Rejected(format!("{}: {}", s, message.trim())),
    }
}

fn classify_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Network(e.to_string())
    }
}
