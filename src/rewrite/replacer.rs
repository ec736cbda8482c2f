//! Occurrence-scoped URL substitution
//!
//! The replacer walks the original source with the position-aware scanner and
//! visits exactly the attribute positions the extraction profile reads from.
//! Each URL found there is resolved the same way the extractor resolves it and,
//! if its resolved form has a mapping, only that byte range is replaced. Text
//! content, comments and unrelated attributes are copied through untouched.

use crate::extract::{ExtractOptions, UrlSyntax};
use crate::markup::{css_urls, decode_entities, escape_attribute, scan_tags, srcset_urls};
use crate::resource::{fragment_of, resolve_url, validate};
use crate::rewrite::mappings::UrlMappings;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use thiserror::Error;
use url::Url;

/// Category of a rewrite failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceErrorKind {
    /// The resource was stored but no reference to it could be rewritten
    NotRewritten,
}

impl ReplaceErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRewritten => "not-rewritten",
        }
    }
}

impl fmt::Display for ReplaceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relocated resource the document still points away from
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{kind}: {message}")]
pub struct ReplaceError {
    pub kind: ReplaceErrorKind,
    pub message: String,

    /// Where the stored copy lives
    pub stored_url: String,
}

impl ReplaceError {
    pub fn not_rewritten(stored_url: impl Into<String>) -> Self {
        Self {
            kind: ReplaceErrorKind::NotRewritten,
            message: "no rewritable reference found in the document".to_string(),
            stored_url: stored_url.into(),
        }
    }
}

/// Output of a replacement pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replacement {
    pub html: String,

    /// Number of URL positions rewritten
    pub replaced: usize,

    /// Mapped originals that matched no position, longest first
    pub skipped: Vec<String>,
}

/// Rewrites mapped resource URLs in place
pub struct Replacer<'a> {
    base_url: &'a Url,
    options: &'a ExtractOptions,
}

/// How a replacement must be written back
#[derive(Clone, Copy)]
enum Context {
    /// Inside an attribute value with this quoting
    Attribute(Option<char>),
    /// Inside `<style>` raw text, written verbatim
    RawText,
}

impl<'a> Replacer<'a> {
    pub fn new(base_url: &'a Url, options: &'a ExtractOptions) -> Self {
        Self { base_url, options }
    }

    /// Rewrites every mapped URL position in `html`
    ///
    /// With an empty mapping set the input is returned unchanged.
    pub fn replace(&self, html: &str, mappings: &UrlMappings) -> Replacement {
        if mappings.is_empty() {
            return Replacement {
                html: html.to_string(),
                replaced: 0,
                skipped: Vec::new(),
            };
        }

        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        let mut matched: HashSet<String> = HashSet::new();

        for tag in scan_tags(html) {
            if tag.name == "style" && self.options.scans_style_blocks() {
                if let Some(text) = tag.raw_text.clone() {
                    for url in css_urls(&html[text.clone()]) {
                        let span = text.start + url.span.start..text.start + url.span.end;
                        self.consider(html, span, Context::RawText, mappings, &mut edits, &mut matched);
                    }
                }
            }

            for attribute in &tag.attributes {
                let Some(value) = attribute.value.clone() else {
                    continue;
                };
                let Some(syntax) = self.options.syntax_for(&tag.name, &attribute.name) else {
                    continue;
                };
                let context = Context::Attribute(attribute.quote);
                let raw = &html[value.clone()];

                match syntax {
                    UrlSyntax::Single => {
                        let span = trimmed(raw, value.start);
                        self.consider(html, span, context, mappings, &mut edits, &mut matched);
                    }
                    UrlSyntax::Srcset => {
                        for range in srcset_urls(raw) {
                            let span = value.start + range.start..value.start + range.end;
                            self.consider(html, span, context, mappings, &mut edits, &mut matched);
                        }
                    }
                    UrlSyntax::Css => {
                        for url in css_urls(raw) {
                            let span = value.start + url.span.start..value.start + url.span.end;
                            self.consider(html, span, context, mappings, &mut edits, &mut matched);
                        }
                    }
                }
            }
        }

        let skipped: Vec<String> = mappings
            .longest_first()
            .into_iter()
            .filter(|original| !matched.contains(*original))
            .map(str::to_string)
            .collect();
        for original in &skipped {
            tracing::warn!("No rewritable position found for {}", original);
        }

        let replaced = edits.len();
        tracing::debug!("Rewrote {} URL positions", replaced);

        Replacement {
            html: apply_edits(html, edits),
            replaced,
            skipped,
        }
    }

    /// Records an edit if the URL at `span` resolves to a mapped original
    fn consider(
        &self,
        html: &str,
        span: Range<usize>,
        context: Context,
        mappings: &UrlMappings,
        edits: &mut Vec<(Range<usize>, String)>,
        matched: &mut HashSet<String>,
    ) {
        if span.is_empty() {
            return;
        }

        let raw = &html[span.clone()];
        let decoded = match context {
            Context::Attribute(_) => decode_entities(raw),
            Context::RawText => raw.into(),
        };
        // An entity-encoded quote around a CSS url() value decodes to a real quote
        let candidate = decoded.trim().trim_matches(|c: char| c == '"' || c == '\'');

        if validate(candidate, self.options.max_url_length).is_err() {
            return;
        }
        let Ok(resolved) = resolve_url(candidate, self.base_url) else {
            return;
        };
        let Some(new_url) = mappings.get(resolved.as_str()) else {
            return;
        };

        let mut target = new_url.to_string();
        if let Some(fragment) = fragment_of(candidate) {
            if !target.contains('#') {
                target.push('#');
                target.push_str(fragment);
            }
        }

        let written = match context {
            Context::Attribute(quote) => escape_attribute(&target, quote),
            Context::RawText => target,
        };

        matched.insert(resolved.as_str().to_string());
        edits.push((span, written));
    }
}

/// Rewrites mapped resource URLs in `html`
///
/// # Arguments
///
/// * `html` - The original markup
/// * `base_url` - The base used during extraction
/// * `options` - The extraction profile used during extraction
/// * `mappings` - Resolved original URL to new URL, successes only
///
/// # Example
///
/// ```
/// use newsletter_relocator::extract::ExtractOptions;
/// use newsletter_relocator::rewrite::{replace, UrlMappings};
/// use url::Url;
///
/// let base = Url::parse("https://ex.com/pages/").unwrap();
/// let mut mappings = UrlMappings::new();
/// mappings.insert(
///     &Url::parse("https://ex.com/docs/guide.pdf").unwrap(),
///     "https://cdn.test/k/guide.pdf",
/// );
///
/// let html = r#"<a href="../docs/guide.pdf">../docs/guide.pdf</a>"#;
/// let result = replace(html, &base, &ExtractOptions::default(), &mappings);
/// assert_eq!(result.html, r#"<a href="https://cdn.test/k/guide.pdf">../docs/guide.pdf</a>"#);
/// ```
pub fn replace(
    html: &str,
    base_url: &Url,
    options: &ExtractOptions,
    mappings: &UrlMappings,
) -> Replacement {
    Replacer::new(base_url, options).replace(html, mappings)
}

/// Narrows a value range to its non-whitespace core
fn trimmed(raw: &str, offset: usize) -> Range<usize> {
    let start = raw.len() - raw.trim_start().len();
    let end = raw.trim_end().len();
    if start >= end {
        return offset..offset;
    }
    offset + start..offset + end
}

/// Splices non-overlapping edits into the source
fn apply_edits(html: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&html[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&html[cursor..]);
    out
}
