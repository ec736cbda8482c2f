//! Resource identification for newsletter references
//!
//! This module answers two questions about a URL string, with no I/O:
//! - what kind of resource does it point to (document, image, unknown)?
//! - is it a reference worth considering at all?
//!
//! Classification is driven entirely by a [`ResourceTable`], so new file types can be
//! added from configuration without touching any parsing code.

mod resolve;
mod table;
mod validate;

pub use resolve::{extract_domain, fragment_of, is_external, resolve_url};
pub use table::{ResourceTable, ResourceType, DEFAULT_RESOURCE_TYPES};
pub use validate::{validate, RejectReason, DEFAULT_MAX_URL_LENGTH};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic kind of a referenced resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// PDFs, office documents, plain text and similar downloadable files
    Document,
    /// Raster or vector images
    Image,
    /// Anything the resource table does not recognize
    Unknown,
}

impl ResourceKind {
    /// Returns the lowercase name used in configuration and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The result of classifying a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The detected kind
    pub kind: ResourceKind,

    /// Lowercase extension without the dot; empty when none could be determined
    pub extension: String,
}

/// Classifies a URL by extension, then path heuristics
///
/// # Examples
///
/// ```
/// use newsletter_relocator::resource::{classify, ResourceKind, ResourceTable};
///
/// let table = ResourceTable::with_defaults();
/// let class = classify("https://ex.com/files/Report.PDF?v=2#page=3", &table);
/// assert_eq!(class.kind, ResourceKind::Document);
/// assert_eq!(class.extension, "pdf");
/// ```
pub fn classify(url: &str, table: &ResourceTable) -> Classification {
    table.classify(url, None)
}

/// Classifies a URL, falling back to a declared MIME type when the extension is inconclusive
pub fn classify_with_mime(url: &str, mime_type: Option<&str>, table: &ResourceTable) -> Classification {
    table.classify(url, mime_type)
}
