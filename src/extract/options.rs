use crate::config::{ExtractionConfig, PipelineConfig};
use crate::resource::{ResourceKind, DEFAULT_MAX_URL_LENGTH};

/// Lazy-loading image attributes; they follow the inline image switch
const LAZY_IMAGE_ATTRIBUTES: &[&str] = &["data-src", "data-srcset"];

/// Lazy-loading background attributes; they follow the background switch
const BACKGROUND_ATTRIBUTES: &[&str] = &["data-background", "data-bg"];

/// How a URL-bearing attribute holds its URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSyntax {
    /// The whole value is one URL
    Single,
    /// A `srcset` candidate list
    Srcset,
    /// CSS text containing `url(...)` references
    Css,
}

/// Extraction profile: which markup positions carry resources and which are kept
///
/// The same profile drives the rewriter, so the set of positions that can be
/// rewritten is exactly the set the extractor reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Drop references hosted on the base URL's own host
    pub external_only: bool,

    /// Scan inline `style` attributes, `<style>` blocks and background attributes
    pub include_backgrounds: bool,

    /// Treat `<img src>`/`<img srcset>` and lazy image attributes as resources
    pub extract_inline_images: bool,

    /// Maximum accepted URL length
    pub max_url_length: usize,

    /// Additional `data-*` attributes whose value is a resource URL
    pub data_attributes: Vec<String>,

    /// Kinds worth relocating; everything else is left alone
    pub kinds: Vec<ResourceKind>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            external_only: false,
            include_backgrounds: false,
            extract_inline_images: false,
            max_url_length: DEFAULT_MAX_URL_LENGTH,
            data_attributes: vec![
                "data-href".to_string(),
                "data-download".to_string(),
                "data-file".to_string(),
            ],
            kinds: vec![ResourceKind::Document, ResourceKind::Image],
        }
    }
}

impl ExtractOptions {
    /// Builds the profile from the configuration sections it draws on
    pub fn from_config(pipeline: &PipelineConfig, extraction: &ExtractionConfig) -> Self {
        Self {
            external_only: pipeline.external_only,
            include_backgrounds: pipeline.include_backgrounds,
            extract_inline_images: extraction.extract_inline_images,
            max_url_length: pipeline.max_url_length,
            data_attributes: extraction
                .data_attributes
                .iter()
                .map(|a| a.to_lowercase())
                .collect(),
            kinds: extraction.extract_kinds.clone(),
        }
    }

    /// Returns how `attribute` on `tag` holds URLs, or `None` if it is not scanned
    ///
    /// Both names must be lowercase.
    pub fn syntax_for(&self, tag: &str, attribute: &str) -> Option<UrlSyntax> {
        match (tag, attribute) {
            ("a", "href") | ("embed", "src") | ("object", "data") | ("source", "src") => {
                Some(UrlSyntax::Single)
            }
            ("source", "srcset") => Some(UrlSyntax::Srcset),
            ("video", "poster") => Some(UrlSyntax::Single),
            ("img", "src") if self.extract_inline_images => Some(UrlSyntax::Single),
            ("img", "srcset") if self.extract_inline_images => Some(UrlSyntax::Srcset),
            (_, "style") if self.include_backgrounds => Some(UrlSyntax::Css),
            (_, "data-srcset") if self.extract_inline_images => Some(UrlSyntax::Srcset),
            (_, attr) if LAZY_IMAGE_ATTRIBUTES.contains(&attr) => {
                self.extract_inline_images.then_some(UrlSyntax::Single)
            }
            (_, attr) if BACKGROUND_ATTRIBUTES.contains(&attr) => {
                self.include_backgrounds.then_some(UrlSyntax::Single)
            }
            (_, attr) if self.data_attributes.iter().any(|a| a == attr) => Some(UrlSyntax::Single),
            _ => None,
        }
    }

    /// Returns true if `<style>` element content is scanned
    pub fn scans_style_blocks(&self) -> bool {
        self.include_backgrounds
    }

    /// Returns true if a resource of this kind is kept
    pub fn keeps_kind(&self, kind: ResourceKind) -> bool {
        self.kinds.contains(&kind)
    }
}
