//! Low-level markup helpers shared by extraction and rewriting
//!
//! Extraction and rewriting both walk the same start tag scan, so every reference
//! the extractor reports sits at a byte range the rewriter can substitute without
//! touching anything around it. Both sides also use the same entity decoding and
//! the same CSS `url()` and `srcset` scanners.

mod css;
mod entities;
mod scanner;
mod srcset;

pub use css::{css_urls, CssUrl};
pub use entities::{decode_entities, escape_attribute};
pub use scanner::{element_content, scan_tags, Attribute, StartTag};
pub use srcset::srcset_urls;
