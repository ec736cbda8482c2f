//! HTTP fetcher and downloader tests against a mock resource host

use newsletter_relocator::config::UserAgentConfig;
use newsletter_relocator::fetch::{
    user_agent_string, DownloadErrorKind, DownloadOptions, DownloadOutcome, Downloader,
    FetchError, Fetcher, HttpFetcher, RetryPolicy,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> HttpFetcher {
    HttpFetcher::from_config(&UserAgentConfig::default()).expect("Failed to build client")
}

fn fast_options() -> DownloadOptions {
    DownloadOptions {
        concurrency: 2,
        timeout: Duration::from_secs(5),
        max_payload_bytes: 1024,
        retry: RetryPolicy::new(2, Duration::from_millis(10), Duration::from_millis(50)),
    }
}

fn resource_url(server: &MockServer, resource_path: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), resource_path)).unwrap()
}

#[tokio::test]
async fn test_fetch_success_with_mime_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/report.pdf"))
        .and(header(
            "user-agent",
            user_agent_string(&UserAgentConfig::default()).as_str(),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"%PDF-1.7 test".to_vec())
                .insert_header("content-type", "Application/PDF; charset=binary"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let body = fetcher()
        .fetch(
            &resource_url(&server, "/files/report.pdf"),
            Duration::from_secs(5),
            1024,
        )
        .await
        .unwrap();

    assert_eq!(body.bytes, b"%PDF-1.7 test");
    assert_eq!(body.mime_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn test_fetch_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let error = fetcher()
        .fetch(&resource_url(&server, "/gone.pdf"), Duration::from_secs(5), 1024)
        .await
        .unwrap_err();

    assert_eq!(
        error,
        FetchError::HttpStatus {
            status: 404,
            retry_after: None
        }
    );
}

#[tokio::test]
async fn test_fetch_reads_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
        .mount(&server)
        .await;

    let error = fetcher()
        .fetch(&resource_url(&server, "/busy.pdf"), Duration::from_secs(5), 1024)
        .await
        .unwrap_err();

    assert_eq!(
        error,
        FetchError::HttpStatus {
            status: 429,
            retry_after: Some(Duration::from_secs(2))
        }
    );
}

#[tokio::test]
async fn test_fetch_rejects_oversized_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
        .mount(&server)
        .await;

    let error = fetcher()
        .fetch(&resource_url(&server, "/big.pdf"), Duration::from_secs(5), 1024)
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::TooLarge { limit: 1024, .. }));
}

#[tokio::test]
async fn test_fetch_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let error = fetcher()
        .fetch(&resource_url(&server, "/slow.pdf"), Duration::from_millis(100), 1024)
        .await
        .unwrap_err();

    assert_eq!(error, FetchError::Timeout);
}

#[tokio::test]
async fn test_download_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"finally".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = Downloader::new(Arc::new(fetcher()), fast_options());
    let results = downloader
        .download_all(vec![resource_url(&server, "/flaky.pdf")], &CancellationToken::new())
        .await
        .unwrap();

    match &results[0].outcome {
        DownloadOutcome::Downloaded(resource) => {
            assert_eq!(resource.bytes, b"finally");
            assert_eq!(resource.attempts, 3);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_download_waits_for_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy.pdf"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"served".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let options = DownloadOptions {
        retry: RetryPolicy::new(2, Duration::from_millis(10), Duration::from_secs(5)),
        ..fast_options()
    };
    let downloader = Downloader::new(Arc::new(fetcher()), options);
    let started = Instant::now();
    let results = downloader
        .download_all(vec![resource_url(&server, "/busy.pdf")], &CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(1));
    match &results[0].outcome {
        DownloadOutcome::Downloaded(resource) => {
            assert_eq!(resource.bytes, b"served");
            assert_eq!(resource.attempts, 2);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_download_client_error_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = Downloader::new(Arc::new(fetcher()), fast_options());
    let results = downloader
        .download_all(vec![resource_url(&server, "/private.pdf")], &CancellationToken::new())
        .await
        .unwrap();

    match &results[0].outcome {
        DownloadOutcome::Failed(error) => {
            assert_eq!(error.kind, DownloadErrorKind::HttpStatus);
            assert_eq!(error.status, Some(403));
            assert_eq!(error.attempts, 1);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_download_keeps_input_order() {
    let server = MockServer::start().await;
    for (name, delay) in [("a", 150), ("b", 0), ("c", 60)] {
        Mock::given(method("GET"))
            .and(path(format!("/{}.pdf", name)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(name.as_bytes().to_vec())
                    .set_delay(Duration::from_millis(delay)),
            )
            .mount(&server)
            .await;
    }

    let urls: Vec<Url> = ["a", "b", "c"]
        .iter()
        .map(|name| resource_url(&server, &format!("/{}.pdf", name)))
        .collect();
    let downloader = Downloader::new(Arc::new(fetcher()), fast_options());
    let results = downloader
        .download_all(urls.clone(), &CancellationToken::new())
        .await
        .unwrap();

    let returned: Vec<&Url> = results.iter().map(|r| &r.url).collect();
    assert_eq!(returned, urls.iter().collect::<Vec<_>>());
    assert!(results.iter().all(|r| r.is_success()));
}
