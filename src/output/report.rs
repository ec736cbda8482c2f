//! Markdown report generation
//!
//! Renders a [`ProcessingOutcome`] as a human-readable report: run metadata,
//! counts, one row per resource and the failure details.

use crate::output::OutputResult;
use crate::pipeline::{ProcessingOutcome, ResourceStatus};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Maximum number of extraction errors listed before truncating
const MAX_LISTED_ERRORS: usize = 50;

/// Writes the Markdown report of a run
///
/// # Arguments
///
/// * `outcome` - The finished run
/// * `config_hash` - Hash of the configuration the run used, if known
/// * `output_path` - Path where the markdown file should be written
pub fn write_markdown_report(
    outcome: &ProcessingOutcome,
    config_hash: Option<&str>,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_report(outcome, config_hash);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run as Markdown
pub fn format_markdown_report(outcome: &ProcessingOutcome, config_hash: Option<&str>) -> String {
    let mut md = String::new();

    md.push_str("# Newsletter Relocation Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Base URL**: {}\n", outcome.base_url));
    md.push_str(&format!("- **Started**: {}\n", outcome.started_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        outcome.elapsed.as_secs_f64()
    ));
    if let Some(hash) = config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    if outcome.cancelled {
        md.push_str("- **Cancelled**: yes, unstarted resources were skipped\n");
    }
    md.push('\n');

    let counts = &outcome.counts;
    md.push_str("## Counts\n\n");
    md.push_str("| Status | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Total | {} |\n", counts.total));
    md.push_str(&format!("| Succeeded | {} |\n", counts.succeeded));
    md.push_str(&format!("| Deduplicated | {} |\n", counts.deduplicated));
    md.push_str(&format!("| Failed | {} |\n", counts.failed));
    md.push_str(&format!("| Cancelled | {} |\n\n", counts.cancelled));

    if !outcome.resources.is_empty() {
        md.push_str("## Resources\n\n");
        md.push_str("| Original URL | Kind | Element | Status | New URL |\n");
        md.push_str("|--------------|------|---------|--------|---------|\n");

        for resource in &outcome.resources {
            let (status, new_url) = match &resource.status {
                ResourceStatus::Succeeded {
                    new_url,
                    deduplicated,
                    ..
                } => {
                    let label = if *deduplicated { "succeeded (dedup)" } else { "succeeded" };
                    (label.to_string(), new_url.as_str())
                }
                ResourceStatus::Failed(failure) => {
                    (format!("failed ({} {})", failure.stage(), failure.kind()), "")
                }
                ResourceStatus::Cancelled => ("cancelled".to_string(), ""),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                escape_cell(resource.resolved_url.as_str()),
                resource.kind,
                resource.element,
                status,
                escape_cell(new_url)
            ));
        }
        md.push('\n');
    }

    let failures: Vec<_> = outcome.failures().collect();
    if !failures.is_empty() {
        md.push_str("## Failures\n\n");
        for (resource, failure) in failures {
            md.push_str(&format!(
                "- `{}`: {} failed ({}): {}\n",
                resource.resolved_url,
                failure.stage(),
                failure.kind(),
                failure.message()
            ));
        }
        md.push('\n');
    }

    if !outcome.extraction_errors.is_empty() {
        md.push_str("## Extraction Errors\n\n");
        for error in outcome.extraction_errors.iter().take(MAX_LISTED_ERRORS) {
            md.push_str(&format!(
                "- `{}` in {}: {}\n",
                error.raw, error.element, error.reason
            ));
        }
        if outcome.extraction_errors.len() > MAX_LISTED_ERRORS {
            md.push_str(&format!(
                "\n... and {} more\n",
                outcome.extraction_errors.len() - MAX_LISTED_ERRORS
            ));
        }
        md.push('\n');
    }

    if !outcome.replacement_skips.is_empty() {
        md.push_str("## Replacement Skips\n\n");
        md.push_str("Relocated, but no matching position was found in the markup:\n\n");
        for url in &outcome.replacement_skips {
            md.push_str(&format!("- {}\n", url));
        }
        md.push('\n');
    }

    md
}

/// Keeps a value from breaking the table layout
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractionError, OriginatingElement};
    use crate::fetch::{DownloadError, DownloadErrorKind};
    use crate::pipeline::{OutcomeCounts, ResourceFailure, ResourceReport};
    use crate::resource::ResourceKind;
    use chrono::Utc;
    use std::time::Duration;
    use url::Url;

    fn create_test_outcome() -> ProcessingOutcome {
        let resources = vec![
            ResourceReport {
                resolved_url: Url::parse("https://files.example.net/report.pdf").unwrap(),
                source_url: "https://files.example.net/report.pdf".to_string(),
                kind: ResourceKind::Document,
                element: "a/href".to_string(),
                duplicates: 0,
                status: ResourceStatus::Succeeded {
                    new_url: "https://cdn.test/abc/report.pdf".to_string(),
                    store_id: "7".to_string(),
                    deduplicated: true,
                },
            },
            ResourceReport {
                resolved_url: Url::parse("https://files.example.net/gone.pdf").unwrap(),
                source_url: "gone.pdf".to_string(),
                kind: ResourceKind::Document,
                element: "a/href".to_string(),
                duplicates: 0,
                status: ResourceStatus::Failed(ResourceFailure::Download(DownloadError {
                    kind: DownloadErrorKind::HttpStatus,
                    message: "HTTP status 404".to_string(),
                    status: Some(404),
                    attempts: 1,
                })),
            },
        ];
        let counts = OutcomeCounts::from_resources(&resources);

        ProcessingOutcome {
            final_html: String::new(),
            base_url: Url::parse("https://news.example.org/").unwrap(),
            resources,
            extraction_errors: vec![ExtractionError {
                raw: "http://[bad".to_string(),
                element: OriginatingElement::new("a", "href"),
                reason: "invalid IPv6 address".to_string(),
            }],
            replacement_skips: vec![],
            counts,
            started_at: Utc::now(),
            elapsed: Duration::from_millis(1250),
            cancelled: false,
        }
    }

    #[test]
    fn test_format_markdown_report() {
        let markdown = format_markdown_report(&create_test_outcome(), Some("abc123"));

        assert!(markdown.contains("# Newsletter Relocation Report"));
        assert!(markdown.contains("- **Config Hash**: abc123"));
        assert!(markdown.contains("| Total | 2 |"));
        assert!(markdown.contains("| Deduplicated | 1 |"));
        assert!(markdown.contains("| Failed | 1 |"));
    }

    #[test]
    fn test_markdown_lists_resources_and_failures() {
        let markdown = format_markdown_report(&create_test_outcome(), None);

        assert!(markdown.contains("succeeded (dedup)"));
        assert!(markdown.contains("https://cdn.test/abc/report.pdf"));
        assert!(markdown.contains("failed (download http-status)"));
        assert!(markdown.contains("## Failures"));
        assert!(markdown.contains("HTTP status 404"));
        assert!(markdown.contains("## Extraction Errors"));
        assert!(markdown.contains("`http://[bad` in a/href"));
        assert!(!markdown.contains("Config Hash"));
        assert!(!markdown.contains("## Replacement Skips"));
    }

    #[test]
    fn test_markdown_empty_run() {
        let mut outcome = create_test_outcome();
        outcome.resources.clear();
        outcome.extraction_errors.clear();
        outcome.counts = OutcomeCounts::default();

        let markdown = format_markdown_report(&outcome, None);
        assert!(markdown.contains("| Total | 0 |"));
        assert!(!markdown.contains("## Resources"));
        assert!(!markdown.contains("## Failures"));
    }
}
