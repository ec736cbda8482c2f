//! URL replacement in newsletter markup
//!
//! Only successful relocations are mapped, and only the markup positions the
//! extraction profile reads from are rewritten. Everything else in the document
//! is preserved byte for byte.

mod mappings;
mod replacer;

pub use mappings::UrlMappings;
pub use replacer::{replace, ReplaceError, ReplaceErrorKind, Replacement, Replacer};
