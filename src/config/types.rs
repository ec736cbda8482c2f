use crate::extract::DEFAULT_MAX_DOCUMENT_BYTES;
use crate::resource::{ResourceKind, ResourceTable, ResourceType, DEFAULT_MAX_URL_LENGTH};
use serde::Deserialize;

/// Main configuration structure for the relocator
///
/// Only `[store]` is required; every other section falls back to its defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub store: StoreConfig,
    #[serde(rename = "resource-types", default)]
    pub resource_types: Vec<ResourceTypeEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            extraction: ExtractionConfig::default(),
            user_agent: UserAgentConfig::default(),
            store: StoreConfig::Local {
                root: "./relocated".to_string(),
                public_base_url: "http://localhost:8080/files".to_string(),
            },
            resource_types: Vec::new(),
        }
    }
}

impl Config {
    /// Builds the classification table: the built-in rows plus `[[resource-types]]`
    pub fn resource_table(&self) -> ResourceTable {
        let mut table = ResourceTable::with_defaults();
        table.extend(self.resource_types.iter().map(|entry| ResourceType {
            extension: entry.extension.clone(),
            kind: entry.kind,
            mime_type: entry.mime.clone(),
        }));
        table
    }
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PipelineConfig {
    /// Base URL relative references resolve against; the CLI flag overrides it
    pub base_url: Option<String>,

    /// Only relocate resources hosted somewhere other than the base URL's host
    pub external_only: bool,

    /// Scan CSS `url(...)` references in style attributes and blocks
    pub include_backgrounds: bool,

    /// Maximum accepted URL length
    pub max_url_length: usize,

    /// Maximum concurrent downloads
    pub download_concurrency: usize,

    /// Maximum concurrent uploads
    pub upload_concurrency: usize,

    /// Retries after the first attempt, per request
    pub max_retries: u32,

    /// Largest accepted resource, in bytes
    pub max_payload_bytes: u64,

    /// Timeout for a single download attempt (seconds)
    pub request_timeout_secs: u64,

    /// First backoff delay (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling, also applied to `Retry-After` (milliseconds)
    pub retry_max_delay_ms: u64,

    /// Cancels the run once exceeded (seconds)
    pub run_deadline_secs: Option<u64>,

    /// Largest accepted input document, in bytes
    pub max_document_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            external_only: false,
            include_backgrounds: false,
            max_url_length: DEFAULT_MAX_URL_LENGTH,
            download_concurrency: 5,
            upload_concurrency: 3,
            max_retries: 2,
            max_payload_bytes: 50 * 1024 * 1024,
            request_timeout_secs: 30,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            run_deadline_secs: None,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

/// Extraction profile configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExtractionConfig {
    /// Treat `<img src>` and `<img srcset>` as resources
    pub extract_inline_images: bool,

    /// `data-*` attributes whose value is a resource URL
    pub data_attributes: Vec<String>,

    /// Resource kinds worth relocating
    pub extract_kinds: Vec<ResourceKind>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            extract_inline_images: false,
            data_attributes: vec![
                "data-href".to_string(),
                "data-download".to_string(),
                "data-file".to_string(),
            ],
            extract_kinds: vec![ResourceKind::Document, ResourceKind::Image],
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the relocator
    pub name: String,

    /// Version of the relocator
    pub version: String,

    /// URL with information about the relocator
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "NewsletterRelocator".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/newsletter-relocator".to_string(),
        }
    }
}

/// Content store configuration, selected by `kind`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Files on local disk with a SQLite index
    Local {
        /// Store directory
        root: String,

        /// Base of the public URLs written into the newsletter
        #[serde(rename = "public-base-url")]
        public_base_url: String,
    },

    /// Remote store API
    Http {
        /// Base URL of the API
        endpoint: String,

        /// Name of the environment variable holding the bearer token
        #[serde(rename = "api-token-env", default)]
        api_token_env: Option<String>,

        /// How long to wait for the readiness handshake (seconds)
        #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
        connect_timeout_secs: u64,

        /// Timeout for a single API request (seconds)
        #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Additional row for the resource classification table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceTypeEntry {
    /// Extension without the dot (e.g., "epub")
    pub extension: String,

    /// Kind the extension maps to
    pub kind: ResourceKind,

    /// Canonical MIME type
    #[serde(default)]
    pub mime: Option<String>,
}
