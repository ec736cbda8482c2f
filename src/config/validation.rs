use crate::config::types::{
    Config, ExtractionConfig, PipelineConfig, ResourceTypeEntry, StoreConfig, UserAgentConfig,
};
use crate::resource::ResourceKind;
use crate::ConfigError;
use url::Url;

/// Upper bound for either stage's concurrency
const MAX_CONCURRENCY: usize = 100;

/// Upper bound for per-request retries
const MAX_RETRIES: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_pipeline_config(&config.pipeline)?;
    validate_extraction_config(&config.extraction)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_store_config(&config.store)?;
    validate_resource_types(&config.resource_types)?;
    Ok(())
}

/// Validates pipeline configuration
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if let Some(base_url) = &config.base_url {
        validate_http_url("base-url", base_url)?;
    }

    for (name, value) in [
        ("download-concurrency", config.download_concurrency),
        ("upload-concurrency", config.upload_concurrency),
    ] {
        if value < 1 || value > MAX_CONCURRENCY {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and {}, got {}",
                name, MAX_CONCURRENCY, value
            )));
        }
    }

    if config.max_retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= {}, got {}",
            MAX_RETRIES, config.max_retries
        )));
    }

    if config.max_url_length < 16 {
        return Err(ConfigError::Validation(format!(
            "max-url-length must be >= 16, got {}",
            config.max_url_length
        )));
    }

    if config.max_payload_bytes == 0 {
        return Err(ConfigError::Validation(
            "max-payload-bytes must be greater than zero".to_string(),
        ));
    }

    if config.max_document_bytes == 0 {
        return Err(ConfigError::Validation(
            "max-document-bytes must be greater than zero".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.retry_base_delay_ms > config.retry_max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry-base-delay-ms ({}) cannot exceed retry-max-delay-ms ({})",
            config.retry_base_delay_ms, config.retry_max_delay_ms
        )));
    }

    if config.run_deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "run-deadline-secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the extraction profile
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    for attribute in &config.data_attributes {
        let lower = attribute.to_lowercase();
        let name = lower.strip_prefix("data-").unwrap_or("");
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "data-attributes entries must look like 'data-name', got '{}'",
                attribute
            )));
        }
    }

    if config.extract_kinds.is_empty() {
        return Err(ConfigError::Validation(
            "extract-kinds must list at least one kind".to_string(),
        ));
    }

    if config.extract_kinds.contains(&ResourceKind::Unknown) {
        return Err(ConfigError::Validation(
            "extract-kinds may only contain 'document' and 'image'".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Name: non-empty, alphanumeric + hyphens only
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !config.name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters and hyphens, got '{}'",
            config.name
        )));
    }

    if config.version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

/// Validates the content store section
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    match config {
        StoreConfig::Local {
            root,
            public_base_url,
        } => {
            if root.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "store root cannot be empty".to_string(),
                ));
            }
            validate_http_url("public-base-url", public_base_url)
        }
        StoreConfig::Http {
            endpoint,
            api_token_env,
            connect_timeout_secs,
            request_timeout_secs,
        } => {
            validate_http_url("endpoint", endpoint)?;

            if api_token_env.as_deref().map_or(false, |name| name.trim().is_empty()) {
                return Err(ConfigError::Validation(
                    "api-token-env cannot be empty when set".to_string(),
                ));
            }

            if *connect_timeout_secs == 0 || *request_timeout_secs == 0 {
                return Err(ConfigError::Validation(
                    "store timeouts must be >= 1 second".to_string(),
                ));
            }

            Ok(())
        }
    }
}

/// Validates `[[resource-types]]` rows
fn validate_resource_types(entries: &[ResourceTypeEntry]) -> Result<(), ConfigError> {
    for entry in entries {
        let extension = entry.extension.trim_start_matches('.');
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "resource type extension must be alphanumeric, got '{}'",
                entry.extension
            )));
        }

        if entry.kind == ResourceKind::Unknown {
            return Err(ConfigError::Validation(format!(
                "resource type '{}' must be a document or an image",
                entry.extension
            )));
        }

        if let Some(mime) = &entry.mime {
            if !mime.contains('/') {
                return Err(ConfigError::Validation(format!(
                    "resource type '{}' has an invalid MIME type '{}'",
                    entry.extension, mime
                )));
            }
        }
    }

    Ok(())
}

/// Requires an absolute HTTP(S) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            field, value
        )));
    }

    Ok(())
}
