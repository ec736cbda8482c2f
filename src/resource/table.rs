use crate::resource::{Classification, ResourceKind};
use std::collections::HashMap;

/// Built-in resource types: (extension, kind, MIME type)
pub const DEFAULT_RESOURCE_TYPES: &[(&str, ResourceKind, &str)] = &[
    // Documents
    ("pdf", ResourceKind::Document, "application/pdf"),
    ("doc", ResourceKind::Document, "application/msword"),
    (
        "docx",
        ResourceKind::Document,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("odt", ResourceKind::Document, "application/vnd.oasis.opendocument.text"),
    ("xls", ResourceKind::Document, "application/vnd.ms-excel"),
    (
        "xlsx",
        ResourceKind::Document,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "ods",
        ResourceKind::Document,
        "application/vnd.oasis.opendocument.spreadsheet",
    ),
    ("ppt", ResourceKind::Document, "application/vnd.ms-powerpoint"),
    (
        "pptx",
        ResourceKind::Document,
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    (
        "odp",
        ResourceKind::Document,
        "application/vnd.oasis.opendocument.presentation",
    ),
    ("txt", ResourceKind::Document, "text/plain"),
    ("csv", ResourceKind::Document, "text/csv"),
    ("rtf", ResourceKind::Document, "application/rtf"),
    // Images
    ("png", ResourceKind::Image, "image/png"),
    ("jpg", ResourceKind::Image, "image/jpeg"),
    ("jpeg", ResourceKind::Image, "image/jpeg"),
    ("gif", ResourceKind::Image, "image/gif"),
    ("webp", ResourceKind::Image, "image/webp"),
    ("svg", ResourceKind::Image, "image/svg+xml"),
    ("bmp", ResourceKind::Image, "image/bmp"),
    ("tif", ResourceKind::Image, "image/tiff"),
    ("tiff", ResourceKind::Image, "image/tiff"),
    ("avif", ResourceKind::Image, "image/avif"),
    ("ico", ResourceKind::Image, "image/vnd.microsoft.icon"),
];

/// One row of the resource table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceType {
    /// Lowercase extension without the dot
    pub extension: String,

    /// Kind this extension maps to
    pub kind: ResourceKind,

    /// Canonical MIME type, if known
    pub mime_type: Option<String>,
}

/// Lookup table from extension and MIME type to resource kind
///
/// The first row registered for a MIME type wins the reverse (MIME to extension)
/// mapping, so `image/jpeg` maps back to `jpg` with the default table. Replacing
/// an extension's row hands the reverse mapping of its MIME type to the new row.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    by_extension: HashMap<String, ResourceType>,
    by_mime: HashMap<String, String>,
}

impl ResourceTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding [`DEFAULT_RESOURCE_TYPES`]
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for (extension, kind, mime) in DEFAULT_RESOURCE_TYPES {
            table.insert(ResourceType {
                extension: extension.to_string(),
                kind: *kind,
                mime_type: Some(mime.to_string()),
            });
        }
        table
    }

    /// Adds or replaces a row
    ///
    /// A MIME type that only pointed at the replaced row is dropped.
    pub fn insert(&mut self, resource_type: ResourceType) {
        let extension = resource_type.extension.trim_start_matches('.').to_lowercase();
        let mime = resource_type.mime_type.as_deref().map(normalize_mime);
        let previous = self.by_extension.insert(
            extension.clone(),
            ResourceType {
                extension: extension.clone(),
                ..resource_type
            },
        );

        let old_mime = previous
            .as_ref()
            .and_then(|row| row.mime_type.as_deref())
            .map(normalize_mime);
        if let Some(old_mime) = old_mime {
            if mime.as_ref() != Some(&old_mime) && self.by_mime.get(&old_mime) == Some(&extension) {
                self.by_mime.remove(&old_mime);
            }
        }

        if let Some(mime) = mime {
            if previous.is_some() {
                self.by_mime.insert(mime, extension);
            } else {
                self.by_mime.entry(mime).or_insert(extension);
            }
        }
    }

    /// Adds every row from an iterator
    pub fn extend<I: IntoIterator<Item = ResourceType>>(&mut self, rows: I) {
        for row in rows {
            self.insert(row);
        }
    }

    /// Looks up a row by extension (case-insensitive)
    pub fn get(&self, extension: &str) -> Option<&ResourceType> {
        self.by_extension.get(&extension.to_lowercase())
    }

    /// Returns the canonical MIME type for an extension
    pub fn mime_for_extension(&self, extension: &str) -> Option<&str> {
        self.get(extension).and_then(|row| row.mime_type.as_deref())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    /// Returns true if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }

    /// Classifies a URL
    ///
    /// # Order of evidence
    ///
    /// 1. Extension of the last path segment (query and fragment stripped)
    /// 2. The declared MIME type, if the caller has one
    /// 3. A path segment literally named after a known extension (`/export/pdf/12`)
    /// 4. Otherwise `Unknown`
    pub fn classify(&self, url: &str, mime_type: Option<&str>) -> Classification {
        let path = url_path(url);
        let extension = extension_of(path);

        if let Some(row) = extension.as_deref().and_then(|ext| self.get(ext)) {
            return Classification {
                kind: row.kind,
                extension: row.extension.clone(),
            };
        }

        if let Some(mime) = mime_type.map(normalize_mime).filter(|m| !m.is_empty()) {
            if let Some(row) = self.by_mime.get(&mime).and_then(|ext| self.get(ext)) {
                return Classification {
                    kind: row.kind,
                    extension: row.extension.clone(),
                };
            }
            if mime.starts_with("image/") {
                return Classification {
                    kind: ResourceKind::Image,
                    extension: extension.unwrap_or_default(),
                };
            }
        }

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if let Some(row) = self.get(segment) {
                return Classification {
                    kind: row.kind,
                    extension: row.extension.clone(),
                };
            }
        }

        Classification {
            kind: ResourceKind::Unknown,
            extension: extension.unwrap_or_default(),
        }
    }
}

/// Returns the path portion of an absolute, protocol-relative or relative URL string
fn url_path(url: &str) -> &str {
    let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    let without_query = &url[..end];

    let after_authority = if let Some(idx) = without_query.find("://") {
        Some(&without_query[idx + 3..])
    } else {
        without_query.strip_prefix("//")
    };

    match after_authority {
        Some(rest) => rest.find('/').map(|idx| &rest[idx..]).unwrap_or(""),
        None => without_query,
    }
}

/// Extracts the lowercase extension of the last path segment
fn extension_of(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next().unwrap_or("");
    let dot = segment.rfind('.')?;
    let extension = &segment[dot + 1..];
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_lowercase())
    }
}

/// Lowercases a MIME type and drops its parameters
fn normalize_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_lowercase()
}
