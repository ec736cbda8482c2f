//! Pipeline orchestrator - sequences one relocation run
//!
//! A run parses the document, downloads every discovered resource, moves the
//! downloads into the content store and finally rewrites the references that
//! made it all the way through. Per-resource failures are collected into the
//! [`ProcessingOutcome`]; only a document that cannot be processed at all
//! fails the run.

use crate::config::Config;
use crate::extract::{check_document, extract, ExtractOptions, ExtractionResult};
use crate::fetch::{DownloadOptions, Downloader, Fetcher};
use crate::pipeline::outcome::{OutcomeCounts, ProcessingOutcome, ResourceReport, ResourceStatus};
use crate::pipeline::stage::RunStage;
use crate::resource::ResourceTable;
use crate::rewrite::{Replacer, UrlMappings};
use crate::store::{ContentStore, UploadOptions, UploadOutcome, Uploader};
use crate::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Wires the extraction, download, upload and rewrite stages together
pub struct Pipeline {
    options: ExtractOptions,
    table: Arc<ResourceTable>,
    downloader: Downloader,
    uploader: Uploader,
    max_document_bytes: usize,
    run_deadline: Option<Duration>,
}

impl Pipeline {
    /// Creates a pipeline from configuration and its two collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `fetcher` - Used for every download
    /// * `store` - Receives the downloaded bytes
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>, store: Arc<dyn ContentStore>) -> Self {
        let table = Arc::new(config.resource_table());
        let options = ExtractOptions::from_config(&config.pipeline, &config.extraction);

        Self {
            options,
            downloader: Downloader::new(fetcher, DownloadOptions::from_config(&config.pipeline)),
            uploader: Uploader::new(
                store,
                UploadOptions::from_config(&config.pipeline),
                table.clone(),
            ),
            table,
            max_document_bytes: config.pipeline.max_document_bytes,
            run_deadline: config.pipeline.run_deadline_secs.map(Duration::from_secs),
        }
    }

    pub fn extract_options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Runs only the parsing stage
    ///
    /// # Returns
    ///
    /// * `Ok(ExtractionResult)` - Discovered resources and resolution errors
    /// * `Err(RelocateError::Document)` - The document cannot be processed
    pub fn discover(&self, html: &str, base_url: &Url) -> Result<ExtractionResult> {
        check_document(html, self.max_document_bytes)?;
        Ok(extract(html, base_url, &self.options, &self.table))
    }

    /// Runs the whole pipeline with no external cancellation
    pub async fn process(&self, html: &str, base_url: &Url) -> Result<ProcessingOutcome> {
        self.process_with_cancel(html, base_url, CancellationToken::new())
            .await
    }

    /// Runs the whole pipeline
    ///
    /// Cancelling `cancel` (or reaching the configured run deadline) stops new
    /// network requests; requests already in flight finish, resources never
    /// attempted are reported as cancelled, and the rewrite still applies every
    /// mapping that completed. A stored resource whose references could not be
    /// rewritten is reported as failed at the `replace` stage.
    ///
    /// # Returns
    ///
    /// * `Ok(ProcessingOutcome)` - The run reached `Done`
    /// * `Err(RelocateError::Document)` - The document failed at parsing
    pub async fn process_with_cancel(
        &self,
        html: &str,
        base_url: &Url,
        cancel: CancellationToken,
    ) -> Result<ProcessingOutcome> {
        let started_at = Utc::now();
        let start = Instant::now();
        let cancel = cancel.child_token();
        let _deadline = self.run_deadline.map(|limit| DeadlineGuard::spawn(limit, &cancel));

        let mut stage = RunStage::Parsing;
        tracing::info!("Parsing document ({} bytes) against {}", html.len(), base_url);
        let extraction = self.discover(html, base_url)?;

        tracing::info!(
            "Found {} resources ({} extraction errors)",
            extraction.occurrences.len(),
            extraction.errors.len()
        );

        if extraction.occurrences.is_empty() {
            stage = stage.advance(RunStage::Done)?;
            tracing::info!("No resources to relocate, run {}", stage);
            return Ok(ProcessingOutcome {
                final_html: html.to_string(),
                base_url: base_url.clone(),
                resources: Vec::new(),
                extraction_errors: extraction.errors,
                replacement_skips: Vec::new(),
                counts: OutcomeCounts::default(),
                started_at,
                elapsed: start.elapsed(),
                cancelled: cancel.is_cancelled(),
            });
        }

        stage = stage.advance(RunStage::Downloading)?;
        let urls = extraction
            .occurrences
            .iter()
            .map(|o| o.resolved_url.clone())
            .collect();
        let downloads = self.downloader.download_all(urls, &cancel).await?;

        stage = stage.advance(RunStage::Uploading)?;
        let uploads = self.uploader.upload_all(downloads, &cancel).await;

        stage = stage.advance(RunStage::Rewriting)?;
        let mut mappings = UrlMappings::new();
        for upload in &uploads {
            if let UploadOutcome::Uploaded(stored) = &upload.outcome {
                mappings.insert(&upload.original_url, stored.new_url.clone());
            }
        }
        let replacement = Replacer::new(base_url, &self.options).replace(html, &mappings);

        let skipped: HashSet<&str> = replacement.skipped.iter().map(String::as_str).collect();
        let resources: Vec<ResourceReport> = extraction
            .occurrences
            .iter()
            .zip(uploads)
            .map(|(occurrence, upload)| {
                let mut report = ResourceReport::new(occurrence, ResourceStatus::from(upload.outcome));
                if skipped.contains(report.resolved_url.as_str()) {
                    report.mark_not_rewritten();
                }
                report
            })
            .collect();
        let counts = OutcomeCounts::from_resources(&resources);

        stage = stage.advance(RunStage::Done)?;
        let elapsed = start.elapsed();
        tracing::info!(
            "Run {}: {} of {} resources relocated ({} deduplicated, {} failed, {} cancelled), {} references rewritten in {:.2}s",
            stage,
            counts.succeeded,
            counts.total,
            counts.deduplicated,
            counts.failed,
            counts.cancelled,
            replacement.replaced,
            elapsed.as_secs_f64()
        );

        Ok(ProcessingOutcome {
            final_html: replacement.html,
            base_url: base_url.clone(),
            resources,
            extraction_errors: extraction.errors,
            replacement_skips: replacement.skipped,
            counts,
            started_at,
            elapsed,
            cancelled: cancel.is_cancelled(),
        })
    }
}

/// Cancels the run token once the deadline passes; aborted when the run ends
struct DeadlineGuard(JoinHandle<()>);

impl DeadlineGuard {
    fn spawn(limit: Duration, cancel: &CancellationToken) -> Self {
        let cancel = cancel.clone();
        Self(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {
                    tracing::warn!("Run deadline of {:?} reached, cancelling", limit);
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        }))
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
