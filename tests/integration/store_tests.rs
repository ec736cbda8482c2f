//! HTTP content store tests against a mock store API

use newsletter_relocator::config::UserAgentConfig;
use newsletter_relocator::fetch::{
    build_http_client, DownloadOutcome, DownloadResult, DownloadedResource, RetryPolicy,
};
use newsletter_relocator::resource::{ResourceKind, ResourceTable};
use newsletter_relocator::store::{
    content_key, ContentStore, HttpContentStore, HttpStoreOptions, ObjectMetadata, StoreError,
    StoreRef, UploadOptions, UploadOutcome, Uploader,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options(server: &MockServer, token: Option<&str>) -> HttpStoreOptions {
    HttpStoreOptions {
        endpoint: format!("{}/api/", server.uri()),
        token: token.map(str::to_string),
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
    }
}

async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

async fn connect(server: &MockServer) -> HttpContentStore {
    let client = build_http_client(&UserAgentConfig::default()).unwrap();
    HttpContentStore::connect(client, options(server, Some("secret")))
        .await
        .expect("Store should be ready")
}

fn metadata(bytes: &[u8]) -> ObjectMetadata {
    ObjectMetadata {
        content_key: content_key(bytes),
        original_url: Url::parse("https://files.example.net/report.pdf").unwrap(),
        file_name: "report.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        kind: ResourceKind::Document,
        extension: "pdf".to_string(),
    }
}

#[tokio::test]
async fn test_connect_waits_for_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_health(&server).await;

    let client = build_http_client(&UserAgentConfig::default()).unwrap();
    let store = HttpContentStore::connect(client, options(&server, None)).await;
    assert!(store.is_ok());
}

#[tokio::test]
async fn test_connect_gives_up_after_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = build_http_client(&UserAgentConfig::default()).unwrap();
    let mut options = options(&server, None);
    options.connect_timeout = Duration::from_millis(300);

    let error = HttpContentStore::connect(client, options).await.unwrap_err();
    assert!(matches!(error, StoreError::NotReady(_)));
}

#[tokio::test]
async fn test_exists_lookup() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    let key = content_key(b"known");
    Mock::given(method("GET"))
        .and(path("/api/objects"))
        .and(query_param("content_key", key.as_str()))
        .and(header("authorization", "Bearer secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "42",
                "url": "https://cdn.example.org/42/report.pdf"
            })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/objects"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = connect(&server).await;

    assert_eq!(
        store.exists(&key).await.unwrap(),
        Some(StoreRef {
            id: "42".to_string(),
            url: "https://cdn.example.org/42/report.pdf".to_string(),
        })
    );
    assert_eq!(store.exists(&content_key(b"unknown")).await.unwrap(), None);
}

#[tokio::test]
async fn test_store_uploads_multipart() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    let bytes = b"%PDF-1.7 body";
    let meta = metadata(bytes);
    Mock::given(method("POST"))
        .and(path("/api/objects"))
        .and(body_string_contains(meta.content_key.as_str()))
        .and(body_string_contains("%PDF-1.7 body"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "7",
                "url": "https://cdn.example.org/7/report.pdf"
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = connect(&server).await;
    let stored = store.store(bytes, &meta).await.unwrap();

    assert_eq!(stored.id, "7");
    assert_eq!(stored.url, "https://cdn.example.org/7/report.pdf");
}

#[tokio::test]
async fn test_store_error_statuses() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    let cases: [(u16, &[u8]); 4] = [
        (409, b"conflict"),
        (413, b"too large"),
        (415, b"unsupported"),
        (502, b"bad gateway"),
    ];
    for (status, body) in cases {
        Mock::given(method("POST"))
            .and(path("/api/objects"))
            .and(body_string_contains(content_key(body).as_str()))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    let store = connect(&server).await;

    let error = store.store(b"conflict", &metadata(b"conflict")).await.unwrap_err();
    assert!(matches!(error, StoreError::Conflict(_)));

    let error = store.store(b"too large", &metadata(b"too large")).await.unwrap_err();
    assert_eq!(error, StoreError::TooLarge);

    let error = store.store(b"unsupported", &metadata(b"unsupported")).await.unwrap_err();
    assert!(matches!(error, StoreError::Rejected(_)));

    let error = store.store(b"bad gateway", &metadata(b"bad gateway")).await.unwrap_err();
    assert!(matches!(error, StoreError::Server { status: 502, .. }));
}

#[tokio::test]
async fn test_upload_waits_for_retry_after() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/objects"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/objects"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/objects"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "9",
                "url": "https://cdn.example.org/9/report.pdf"
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let uploader = Uploader::new(
        Arc::new(connect(&server).await),
        UploadOptions {
            concurrency: 1,
            retry: RetryPolicy::new(2, Duration::from_millis(10), Duration::from_secs(5)),
        },
        Arc::new(ResourceTable::with_defaults()),
    );
    let bytes = b"%PDF-1.7 busy".to_vec();
    let download = DownloadResult {
        url: Url::parse("https://files.example.net/report.pdf").unwrap(),
        outcome: DownloadOutcome::Downloaded(DownloadedResource {
            byte_size: bytes.len() as u64,
            bytes,
            mime_type: Some("application/pdf".to_string()),
            attempts: 1,
        }),
    };

    let started = Instant::now();
    let results = uploader
        .upload_all(vec![download], &CancellationToken::new())
        .await;

    assert!(started.elapsed() >= Duration::from_secs(1));
    match &results[0].outcome {
        UploadOutcome::Uploaded(stored) => {
            assert_eq!(stored.store_id, "9");
            assert!(!stored.deduplicated);
            // one lookup, then the rate-limited upload and its retry
            assert_eq!(stored.attempts, 3);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}
