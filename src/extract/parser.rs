//! HTML walker that collects resource occurrences
//!
//! # Positions scanned
//!
//! | Element | Attribute | Condition |
//! |---------|-----------|-----------|
//! | `a` | `href` | always |
//! | `embed` | `src` | always |
//! | `object` | `data` | always |
//! | `source` | `src`, `srcset` | always |
//! | `video` | `poster` | always |
//! | any | configured `data-*` | always |
//! | `img` | `src`, `srcset`, `data-src` | `extract_inline_images` |
//! | any | `style`, `data-background` | `include_backgrounds` |
//! | `style` | element text | `include_backgrounds` |
//!
//! A reference is kept only if the resource table classifies it as one of the
//! profile's kinds, so ordinary page links are never treated as resources.
//!
//! The walk runs over [`scan_tags`], the same start tag scan the rewriter uses,
//! so every reported occurrence sits at a position the rewriter will visit.

use crate::extract::options::{ExtractOptions, UrlSyntax};
use crate::extract::{
    ExtractionError, ExtractionResult, OriginatingElement, ResourceContext, ResourceOccurrence,
};
use crate::markup::{css_urls, decode_entities, element_content, scan_tags, srcset_urls, StartTag};
use crate::resource::{is_external, resolve_url, validate, ResourceTable};
use crate::UrlError;
use scraper::Html;
use std::collections::HashMap;
use url::Url;

/// Extracts resource occurrences from an HTML document
///
/// Parsing is permissive: malformed or unclosed markup yields a best-effort
/// tree, never an error. Output is deterministic and in document order.
///
/// # Arguments
///
/// * `html` - The raw newsletter markup
/// * `base_url` - The URL relative references resolve against
/// * `options` - The extraction profile
/// * `table` - The resource classification table
///
/// # Example
///
/// ```
/// use newsletter_relocator::extract::{extract, ExtractOptions};
/// use newsletter_relocator::resource::ResourceTable;
/// use url::Url;
///
/// let html = r#"<a href="../docs/guide.pdf">Guide</a>"#;
/// let base = Url::parse("https://ex.com/pages/").unwrap();
/// let result = extract(html, &base, &ExtractOptions::default(), &ResourceTable::with_defaults());
/// assert_eq!(result.occurrences.len(), 1);
/// assert_eq!(result.occurrences[0].resolved_url.as_str(), "https://ex.com/docs/guide.pdf");
/// ```
pub fn extract(
    html: &str,
    base_url: &Url,
    options: &ExtractOptions,
    table: &ResourceTable,
) -> ExtractionResult {
    let mut collector = Collector::new(base_url, options, table);

    for tag in scan_tags(html) {
        if tag.name == "style" {
            if options.scans_style_blocks() {
                if let Some(text) = tag.raw_text.clone() {
                    let origin = OriginatingElement::new("style", "#text");
                    let context = ResourceContext::default();
                    for url in css_urls(&html[text]) {
                        collector.consider(url.value, &origin, &context);
                    }
                }
            }
            continue;
        }

        let mut context: Option<ResourceContext> = None;
        for attribute in &tag.attributes {
            let Some(range) = attribute.value.clone() else {
                continue;
            };
            let Some(syntax) = options.syntax_for(&tag.name, &attribute.name) else {
                continue;
            };
            let origin = OriginatingElement::new(&tag.name, &attribute.name);
            let context = context.get_or_insert_with(|| element_context(html, &tag));
            let value = decode_entities(&html[range]);

            match syntax {
                UrlSyntax::Single => collector.consider(&value, &origin, context),
                UrlSyntax::Srcset => {
                    for range in srcset_urls(&value) {
                        collector.consider(&value[range], &origin, context);
                    }
                }
                UrlSyntax::Css => {
                    for url in css_urls(&value) {
                        collector.consider(url.value, &origin, context);
                    }
                }
            }
        }
    }

    let result = collector.finish();
    tracing::debug!(
        "Extracted {} resources ({} errors) from {} bytes of markup",
        result.occurrences.len(),
        result.errors.len(),
        html.len()
    );
    result
}

/// Accumulates unique occurrences and errors during one pass
struct Collector<'a> {
    base_url: &'a Url,
    options: &'a ExtractOptions,
    table: &'a ResourceTable,
    seen: HashMap<String, usize>,
    occurrences: Vec<ResourceOccurrence>,
    errors: Vec<ExtractionError>,
}

impl<'a> Collector<'a> {
    fn new(base_url: &'a Url, options: &'a ExtractOptions, table: &'a ResourceTable) -> Self {
        Self {
            base_url,
            options,
            table,
            seen: HashMap::new(),
            occurrences: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Validates, resolves, classifies and records one candidate reference
    fn consider(&mut self, raw: &str, origin: &OriginatingElement, context: &ResourceContext) {
        if let Err(reason) = validate(raw, self.options.max_url_length) {
            if reason.is_ignorable() {
                tracing::trace!("Ignoring {} in {}: {}", raw.trim(), origin, reason);
            } else {
                self.record_error(raw, origin, reason.to_string());
            }
            return;
        }

        let resolved = match resolve_url(raw, self.base_url) {
            Ok(url) => url,
            Err(UrlError::InvalidScheme(scheme)) => {
                // Only worth reporting if it would otherwise have been a resource
                if self.options.keeps_kind(self.table.classify(raw, None).kind) {
                    self.record_error(raw, origin, format!("unsupported scheme {}", scheme));
                } else {
                    tracing::trace!("Ignoring {} in {}: scheme {}", raw.trim(), origin, scheme);
                }
                return;
            }
            Err(e) => {
                self.record_error(raw, origin, e.to_string());
                return;
            }
        };

        let class = self.table.classify(resolved.as_str(), None);
        if !self.options.keeps_kind(class.kind) {
            tracing::trace!("Skipping {} in {}: kind {}", resolved, origin, class.kind);
            return;
        }

        let external = is_external(&resolved, self.base_url);
        if self.options.external_only && !external {
            tracing::debug!("Skipping same-host resource {}", resolved);
            return;
        }

        if let Some(&index) = self.seen.get(resolved.as_str()) {
            self.occurrences[index].duplicates += 1;
            return;
        }

        tracing::debug!("Found {} resource {} in {}", class.kind, resolved, origin);
        self.seen
            .insert(resolved.as_str().to_string(), self.occurrences.len());
        self.occurrences.push(ResourceOccurrence {
            source_url: raw.trim().to_string(),
            resolved_url: resolved,
            kind: class.kind,
            extension: class.extension,
            element: origin.clone(),
            context: context.clone(),
            is_external: external,
            duplicates: 0,
        });
    }

    fn record_error(&mut self, raw: &str, origin: &OriginatingElement, reason: String) {
        tracing::debug!("Unusable reference {:?} in {}: {}", raw, origin, reason);
        self.errors.push(ExtractionError {
            raw: raw.to_string(),
            element: origin.clone(),
            reason,
        });
    }

    fn finish(self) -> ExtractionResult {
        ExtractionResult {
            occurrences: self.occurrences,
            errors: self.errors,
        }
    }
}

/// Reads alt, title, aria-label and (for anchors) link text from a start tag
fn element_context(html: &str, tag: &StartTag) -> ResourceContext {
    let attr = |name: &str| {
        tag.attribute(name)
            .and_then(|a| a.value.clone())
            .map(|range| decode_entities(&html[range]).trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let link_text = if tag.name == "a" {
        let fragment = Html::parse_fragment(&html[element_content(html, tag)]);
        let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(collapsed).filter(|t| !t.is_empty())
    } else {
        None
    };

    ResourceContext {
        alt: attr("alt"),
        title: attr("title"),
        aria_label: attr("aria-label"),
        link_text,
    }
}
