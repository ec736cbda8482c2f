//! Content store module
//!
//! This module moves downloaded bytes into managed storage, including:
//! - The [`ContentStore`] trait and its error taxonomy
//! - [`LocalContentStore`]: files on disk indexed in SQLite
//! - [`HttpContentStore`]: a remote store API with a readiness handshake
//! - [`Uploader`]: bounded, retrying, deduplicating batch uploads

mod http;
mod local;
mod schema;
mod traits;
mod uploader;

pub use http::{HttpContentStore, HttpStoreOptions};
pub use local::LocalContentStore;
pub use schema::{initialize_schema, SCHEMA_VERSION};
pub use traits::{ContentStore, ObjectMetadata, StoreError, StoreRef, StoreResult};
pub use uploader::{
    content_key, file_name_for, StoredResource, UploadError, UploadErrorKind, UploadOptions,
    UploadOutcome, UploadResult, Uploader,
};

use crate::config::{StoreConfig, UserAgentConfig};
use crate::fetch::build_http_client;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Opens the content store described by the configuration
///
/// # Arguments
///
/// * `config` - The `[store]` section
/// * `user_agent` - Identity used for HTTP store requests
///
/// # Returns
///
/// * `Ok(Arc<dyn ContentStore>)` - A ready store
/// * `Err(StoreError)` - The store could not be opened or never became ready
pub async fn open_store(
    config: &StoreConfig,
    user_agent: &UserAgentConfig,
) -> StoreResult<Arc<dyn ContentStore>> {
    match config {
        StoreConfig::Local {
            root,
            public_base_url,
        } => {
            let store = LocalContentStore::open(Path::new(root), public_base_url)?;
            Ok(Arc::new(store))
        }
        StoreConfig::Http {
            endpoint,
            api_token_env,
            connect_timeout_secs,
            request_timeout_secs,
        } => {
            let token = api_token_env.as_deref().and_then(|name| match std::env::var(name) {
                Ok(token) => Some(token),
                Err(_) => {
                    tracing::warn!("Environment variable {} is not set; sending no token", name);
                    None
                }
            });

            let client =
                build_http_client(user_agent).map_err(|e| StoreError::Network(e.to_string()))?;
            let options = HttpStoreOptions {
                endpoint: endpoint.clone(),
                token,
                connect_timeout: Duration::from_secs(*connect_timeout_secs),
                request_timeout: Duration::from_secs(*request_timeout_secs),
            };
            let store = HttpContentStore::connect(client, options).await?;
            Ok(Arc::new(store))
        }
    }
}
