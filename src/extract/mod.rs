//! Resource extraction from newsletter markup
//!
//! This module scans an HTML document and produces the ordered list of
//! external resources it references, each classified by the resource table.
//! Extraction never fails on malformed markup; individual references that cannot
//! be resolved are recorded as [`ExtractionError`]s and the scan continues.

mod options;
mod parser;

pub use options::{ExtractOptions, UrlSyntax};
pub use parser::extract;

use crate::resource::ResourceKind;
use crate::DocumentError;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Default maximum document size accepted by a run (10 MiB)
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Where in the markup a reference was read from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OriginatingElement {
    /// Lowercase tag name
    pub tag: String,

    /// Lowercase attribute name, or `#text` for `<style>` content
    pub attribute: String,
}

impl OriginatingElement {
    pub fn new(tag: &str, attribute: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

impl fmt::Display for OriginatingElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tag, self.attribute)
    }
}

/// Human-readable context found on the referencing element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceContext {
    pub alt: Option<String>,
    pub title: Option<String>,
    pub aria_label: Option<String>,
    /// Visible text of an anchor
    pub link_text: Option<String>,
}

impl ResourceContext {
    /// Returns the most descriptive label available
    pub fn label(&self) -> Option<&str> {
        self.title
            .as_deref()
            .or(self.aria_label.as_deref())
            .or(self.alt.as_deref())
            .or(self.link_text.as_deref())
    }
}

/// One discovered reference to an external resource
///
/// Occurrences are deduplicated by `resolved_url`; the first one seen keeps its
/// context and `duplicates` counts the later references folded into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceOccurrence {
    /// The reference exactly as written (entities decoded)
    pub source_url: String,

    /// Absolute URL, fragment removed
    pub resolved_url: Url,

    pub kind: ResourceKind,

    /// Lowercase extension, possibly empty
    pub extension: String,

    pub element: OriginatingElement,

    pub context: ResourceContext,

    /// Resolved host differs from the base URL's host
    pub is_external: bool,

    /// Number of later references with the same resolved URL
    pub duplicates: usize,
}

/// A reference that looked like a resource but could not be used
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionError {
    /// The offending string as written
    pub raw: String,

    pub element: OriginatingElement,

    pub reason: String,
}

/// Output of one extraction pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionResult {
    /// Unique resources in document order
    pub occurrences: Vec<ResourceOccurrence>,

    /// Resolution and validation failures, in document order
    pub errors: Vec<ExtractionError>,
}

/// Checks that a document can be processed at all
///
/// The HTML parser itself accepts any input, so the only document-level failures
/// are an input with no content and one beyond the size limit.
pub fn check_document(html: &str, max_bytes: usize) -> Result<(), DocumentError> {
    if html.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    if html.len() > max_bytes {
        return Err(DocumentError::TooLarge {
            size: html.len(),
            limit: max_bytes,
        });
    }
    Ok(())
}
