use std::fmt;

/// Default maximum accepted URL length, in characters
pub const DEFAULT_MAX_URL_LENGTH: usize = 2048;

/// Schemes that never point at a downloadable resource
const IGNORED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:"];

/// Why a URL string was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Empty or whitespace-only
    Empty,
    /// Inline `data:` URI
    DataUri,
    /// `mailto:`, `tel:` or `javascript:`
    IgnoredScheme(String),
    /// Same-document anchor (`#section`)
    FragmentOnly,
    /// Longer than the configured maximum
    TooLong { length: usize, limit: usize },
}

impl RejectReason {
    /// Returns true for rejections that are ordinary markup rather than problems
    ///
    /// Only over-long URLs are worth reporting back to an operator.
    pub fn is_ignorable(&self) -> bool {
        !matches!(self, Self::TooLong { .. })
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty URL"),
            Self::DataUri => write!(f, "data URI"),
            Self::IgnoredScheme(scheme) => write!(f, "ignored scheme {}", scheme),
            Self::FragmentOnly => write!(f, "fragment-only reference"),
            Self::TooLong { length, limit } => {
                write!(f, "URL is {} characters, limit is {}", length, limit)
            }
        }
    }
}

/// Validates a raw URL string as written in markup
///
/// Rejects empty strings, `data:` URIs, `mailto:`/`tel:`/`javascript:` links,
/// fragment-only references, and URLs longer than `max_length` characters.
/// Anything else is accepted; whether it actually resolves is decided later.
///
/// # Examples
///
/// ```
/// use newsletter_relocator::resource::{validate, RejectReason};
///
/// assert!(validate("../docs/guide.pdf", 2048).is_ok());
/// assert_eq!(validate("#top", 2048), Err(RejectReason::FragmentOnly));
/// ```
pub fn validate(url: &str, max_length: usize) -> Result<(), RejectReason> {
    let trimmed = url.trim();

    if trimmed.is_empty() {
        return Err(RejectReason::Empty);
    }

    if trimmed.starts_with('#') {
        return Err(RejectReason::FragmentOnly);
    }

    let lower = trimmed
        .get(..trimmed.len().min(16))
        .unwrap_or(trimmed)
        .to_ascii_lowercase();

    if lower.starts_with("data:") {
        return Err(RejectReason::DataUri);
    }

    if let Some(scheme) = IGNORED_SCHEMES.iter().find(|s| lower.starts_with(*s)) {
        return Err(RejectReason::IgnoredScheme(scheme.trim_end_matches(':').to_string()));
    }

    let length = trimmed.chars().count();
    if length > max_length {
        return Err(RejectReason::TooLong {
            length,
            limit: max_length,
        });
    }

    Ok(())
}
