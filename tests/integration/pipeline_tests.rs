//! End-to-end pipeline tests: mock resource host, real HTTP fetcher and a
//! local content store in a temporary directory

use newsletter_relocator::config::{Config, PipelineConfig, UserAgentConfig};
use newsletter_relocator::fetch::HttpFetcher;
use newsletter_relocator::pipeline::{Pipeline, ResourceFailure, ResourceStatus};
use newsletter_relocator::store::{content_key, ContentStore, LocalContentStore};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PUBLIC_BASE: &str = "https://cdn.example.org/files";

fn create_test_config() -> Config {
    Config {
        pipeline: PipelineConfig {
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 50,
            ..PipelineConfig::default()
        },
        ..Config::default()
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<LocalContentStore>,
    pipeline: Pipeline,
}

fn harness(config: &Config) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LocalContentStore::open(dir.path(), PUBLIC_BASE).unwrap());
    let fetcher = Arc::new(HttpFetcher::from_config(&UserAgentConfig::default()).unwrap());
    let pipeline = Pipeline::new(config, fetcher, store.clone() as Arc<dyn ContentStore>);
    Harness {
        _dir: dir,
        store,
        pipeline,
    }
}

async fn serve(server: &MockServer, resource_path: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(resource_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body.to_vec())
                .insert_header("content-type", "application/pdf"),
        )
        .mount(server)
        .await;
}

fn stored_url(body: &[u8], file_name: &str) -> String {
    format!("{}/{}/{}", PUBLIC_BASE, content_key(body), file_name)
}

fn newsletter_base() -> Url {
    Url::parse("https://news.example.org/issues/42/").unwrap()
}

#[tokio::test]
async fn test_relocates_and_rewrites_links() {
    let server = MockServer::start().await;
    serve(&server, "/docs/agenda.pdf", b"agenda").await;
    let uri = server.uri();

    let html = format!(
        r#"<html><body>
<p>Download the <a href="{uri}/docs/agenda.pdf" title="Agenda">agenda</a>.</p>
<p>Plain text mention: {uri}/docs/agenda.pdf</p>
<a href="https://news.example.org/archive">Archive</a>
</body></html>"#
    );

    let h = harness(&create_test_config());
    let outcome = h.pipeline.process(&html, &newsletter_base()).await.unwrap();

    let new_url = stored_url(b"agenda", "agenda.pdf");
    assert_eq!(outcome.counts.total, 1);
    assert_eq!(outcome.counts.succeeded, 1);
    assert!(outcome
        .final_html
        .contains(&format!(r#"<a href="{}" title="Agenda">"#, new_url)));
    assert!(outcome
        .final_html
        .contains(&format!("Plain text mention: {uri}/docs/agenda.pdf")));
    assert!(outcome
        .final_html
        .contains(r#"<a href="https://news.example.org/archive">"#));
    assert_eq!(h.store.object_count().unwrap(), 1);
}

#[tokio::test]
async fn test_not_found_keeps_original_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let missing = format!("{}/docs/missing.pdf", server.uri());
    let html = format!(r#"<p><a href="{missing}">Missing</a></p>"#);

    let h = harness(&create_test_config());
    let outcome = h.pipeline.process(&html, &newsletter_base()).await.unwrap();

    assert_eq!(outcome.final_html, html);
    assert_eq!(outcome.counts.failed, 1);
    match outcome.status_of(&missing) {
        Some(ResourceStatus::Failed(failure)) => {
            assert_eq!(failure.stage(), "download");
            assert_eq!(failure.kind(), "http-status");
            assert!(matches!(failure, ResourceFailure::Download(e) if e.status == Some(404)));
        }
        other => panic!("unexpected status {:?}", other),
    }
}

#[tokio::test]
async fn test_shared_resource_is_processed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs/guide.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"guide".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let uri = server.uri();

    // both references resolve to the same URL once the fragment is dropped
    let html = format!(
        r#"<a href="{uri}/docs/guide.pdf">Guide</a>
<embed src="{uri}/docs/guide.pdf#page=3">"#
    );

    let h = harness(&create_test_config());
    let outcome = h.pipeline.process(&html, &newsletter_base()).await.unwrap();

    let new_url = stored_url(b"guide", "guide.pdf");
    assert_eq!(outcome.resources.len(), 1);
    assert_eq!(outcome.resources[0].duplicates, 1);
    assert!(outcome
        .final_html
        .contains(&format!(r#"<a href="{}">"#, new_url)));
    assert!(outcome
        .final_html
        .contains(&format!(r#"<embed src="{}#page=3">"#, new_url)));
}

#[tokio::test]
async fn test_partial_failure_is_contained() {
    let server = MockServer::start().await;
    serve(&server, "/ok/one.pdf", b"one").await;
    serve(&server, "/ok/two.docx", b"two").await;
    Mock::given(method("GET"))
        .and(path("/broken/three.pdf"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken/four.xlsx"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    let uri = server.uri();

    let html = format!(
        r#"<ul>
<li><a href="{uri}/ok/one.pdf">1</a></li>
<li><a href="{uri}/broken/three.pdf">3</a></li>
<li><a href="{uri}/ok/two.docx">2</a></li>
<li><a href="{uri}/broken/four.xlsx">4</a></li>
</ul>"#
    );

    let h = harness(&create_test_config());
    let outcome = h.pipeline.process(&html, &newsletter_base()).await.unwrap();

    assert_eq!(outcome.counts.total, 4);
    assert_eq!(outcome.counts.succeeded, 2);
    assert_eq!(outcome.counts.failed, 2);
    assert_eq!(outcome.failures().count(), 2);

    // resources are reported in document order
    let order: Vec<&str> = outcome
        .resources
        .iter()
        .map(|r| r.resolved_url.path())
        .collect();
    assert_eq!(
        order,
        vec!["/ok/one.pdf", "/broken/three.pdf", "/ok/two.docx", "/broken/four.xlsx"]
    );

    assert!(outcome.final_html.contains(&stored_url(b"one", "one.pdf")));
    assert!(outcome.final_html.contains(&stored_url(b"two", "two.docx")));
    assert!(outcome.final_html.contains(&format!("{uri}/broken/three.pdf")));
    assert!(outcome.final_html.contains(&format!("{uri}/broken/four.xlsx")));
}

#[tokio::test]
async fn test_identical_content_is_stored_once() {
    let server = MockServer::start().await;
    serve(&server, "/a/minutes.pdf", b"same bytes").await;
    serve(&server, "/b/minutes-copy.pdf", b"same bytes").await;
    let uri = server.uri();

    let html = format!(
        r#"<a href="{uri}/a/minutes.pdf">A</a> <a href="{uri}/b/minutes-copy.pdf">B</a>"#
    );

    let mut config = create_test_config();
    config.pipeline.upload_concurrency = 1;
    let h = harness(&config);
    let outcome = h.pipeline.process(&html, &newsletter_base()).await.unwrap();

    assert_eq!(outcome.counts.succeeded, 2);
    assert_eq!(outcome.counts.deduplicated, 1);
    assert_eq!(h.store.object_count().unwrap(), 1);
}

#[tokio::test]
async fn test_second_run_is_deduplicated() {
    let server = MockServer::start().await;
    serve(&server, "/docs/report.pdf", b"report").await;
    let html = format!(r#"<a href="{}/docs/report.pdf">Report</a>"#, server.uri());

    let h = harness(&create_test_config());
    let first = h.pipeline.process(&html, &newsletter_base()).await.unwrap();
    let second = h.pipeline.process(&html, &newsletter_base()).await.unwrap();

    assert_eq!(first.counts.deduplicated, 0);
    assert_eq!(second.counts.deduplicated, 1);
    assert_eq!(first.final_html, second.final_html);
    assert_eq!(h.store.object_count().unwrap(), 1);
}

#[tokio::test]
async fn test_relative_references_and_images() {
    let server = MockServer::start().await;
    serve(&server, "/docs/guide.pdf", b"guide").await;
    serve(&server, "/img/hero.png", b"png").await;
    let base = Url::parse(&format!("{}/pages/", server.uri())).unwrap();

    let html = r#"<a href="../docs/guide.pdf">Guide</a><img src="../img/hero.png" alt="Hero">"#;

    // default profile: inline images stay where they are
    let h = harness(&create_test_config());
    let outcome = h.pipeline.process(html, &base).await.unwrap();
    assert_eq!(outcome.counts.total, 1);
    assert!(outcome.final_html.contains(r#"<img src="../img/hero.png" alt="Hero">"#));

    let mut config = create_test_config();
    config.extraction.extract_inline_images = true;
    let h = harness(&config);
    let outcome = h.pipeline.process(html, &base).await.unwrap();
    assert_eq!(outcome.counts.total, 2);
    assert!(outcome
        .final_html
        .contains(&format!(r#"<img src="{}" alt="Hero">"#, stored_url(b"png", "hero.png"))));
}

#[tokio::test]
async fn test_cancelled_run_leaves_document_unchanged() {
    let server = MockServer::start().await;
    serve(&server, "/docs/agenda.pdf", b"agenda").await;
    let html = format!(r#"<a href="{}/docs/agenda.pdf">Agenda</a>"#, server.uri());

    let h = harness(&create_test_config());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = h
        .pipeline
        .process_with_cancel(&html, &newsletter_base(), cancel)
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.counts.cancelled, 1);
    assert_eq!(outcome.final_html, html);
    assert_eq!(h.store.object_count().unwrap(), 0);
}

#[tokio::test]
async fn test_outcome_serializes_to_json() {
    let server = MockServer::start().await;
    serve(&server, "/docs/agenda.pdf", b"agenda").await;
    let html = format!(r#"<a href="{}/docs/agenda.pdf">Agenda</a>"#, server.uri());

    let h = harness(&create_test_config());
    let outcome = h.pipeline.process(&html, &newsletter_base()).await.unwrap();
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["counts"]["succeeded"], 1);
    assert_eq!(json["resources"][0]["status"], "succeeded");
    assert_eq!(json["resources"][0]["kind"], "document");
    assert!(json["elapsed_secs"].is_number());
}
