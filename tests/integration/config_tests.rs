//! Configuration loading tests, including a run driven entirely by a config file

use newsletter_relocator::config::{load_config, load_config_with_hash, StoreConfig};
use newsletter_relocator::fetch::HttpFetcher;
use newsletter_relocator::resource::ResourceKind;
use newsletter_relocator::store::open_store;
use newsletter_relocator::{ConfigError, Pipeline, RelocateError};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
[pipeline]
base-url = "https://news.example.org/"
external-only = true
include-backgrounds = true
download-concurrency = 8
upload-concurrency = 2
max-retries = 4
run-deadline-secs = 120

[extraction]
extract-inline-images = true
data-attributes = ["data-href", "data-asset"]
extract-kinds = ["document"]

[user-agent]
name = "TestRelocator"
version = "2.0"
contact-url = "https://example.org/bot"

[store]
kind = "http"
endpoint = "https://assets.example.org/api"
api-token-env = "ASSET_TOKEN"

[[resource-types]]
extension = "epub"
kind = "document"
mime = "application/epub+zip"
"#,
    );

    let (config, hash) = load_config_with_hash(file.path()).unwrap();

    assert_eq!(hash.len(), 64);
    assert_eq!(config.pipeline.base_url.as_deref(), Some("https://news.example.org/"));
    assert!(config.pipeline.external_only);
    assert_eq!(config.pipeline.download_concurrency, 8);
    assert_eq!(config.pipeline.max_retries, 4);
    assert_eq!(config.pipeline.run_deadline_secs, Some(120));
    assert_eq!(config.extraction.extract_kinds, vec![ResourceKind::Document]);
    assert_eq!(config.user_agent.name, "TestRelocator");
    assert_eq!(
        config.store,
        StoreConfig::Http {
            endpoint: "https://assets.example.org/api".to_string(),
            api_token_env: Some("ASSET_TOKEN".to_string()),
            connect_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    );
    assert_eq!(
        config.resource_table().classify("https://x.org/book.EPUB", None).kind,
        ResourceKind::Document
    );
}

#[test]
fn test_missing_store_section_is_rejected() {
    let file = write_config("[pipeline]\nmax-retries = 1\n");

    let result = load_config(file.path());
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = write_config(
        r#"
[pipeline]
download-concurrency = 0

[store]
kind = "local"
root = "./out"
public-base-url = "https://cdn.example.org/files"
"#,
    );

    let result = load_config(file.path());
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[tokio::test]
async fn test_config_driven_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books/handbook.epub"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"epub bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let store_dir = TempDir::new().unwrap();
    let file = write_config(&format!(
        r#"
[pipeline]
retry-base-delay-ms = 10

[store]
kind = "local"
root = "{}"
public-base-url = "https://cdn.example.org/files/"

[[resource-types]]
extension = "epub"
kind = "document"
"#,
        store_dir.path().display()
    ));

    let config = load_config(file.path()).unwrap();
    let store = open_store(&config.store, &config.user_agent).await.unwrap();
    let fetcher = std::sync::Arc::new(HttpFetcher::from_config(&config.user_agent).unwrap());
    let pipeline = Pipeline::new(&config, fetcher, store);

    let html = format!(r#"<a href="{}/books/handbook.epub">Handbook</a>"#, server.uri());
    let base = Url::parse("https://news.example.org/").unwrap();
    let outcome = pipeline.process(&html, &base).await.unwrap();

    assert_eq!(outcome.counts.succeeded, 1);
    assert!(outcome
        .final_html
        .contains(r#"href="https://cdn.example.org/files/"#));
    assert!(outcome.final_html.ends_with(r#"/handbook.epub">Handbook</a>"#));
    assert!(store_dir.path().join("index.db").exists());

    let error = pipeline.process("", &base).await.unwrap_err();
    assert!(matches!(error, RelocateError::Document(_)));
}
