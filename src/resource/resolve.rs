use crate::UrlError;
use url::Url;

/// Resolves a raw reference against a base URL
///
/// # Resolution Steps
///
/// 1. Trim surrounding whitespace
/// 2. Join against `base` using standard URL resolution (handles `../`,
///    absolute paths and protocol-relative `//host/path` forms)
/// 3. Require an HTTP or HTTPS scheme and a host
/// 4. Drop the fragment, which is never sent to a server
///
/// # Examples
///
/// ```
/// use newsletter_relocator::resource::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("https://ex.com/pages/").unwrap();
/// let url = resolve_url("../docs/guide.pdf#page=2", &base).unwrap();
/// assert_eq!(url.as_str(), "https://ex.com/docs/guide.pdf");
/// ```
pub fn resolve_url(raw: &str, base: &Url) -> Result<Url, UrlError> {
    let trimmed = raw.trim();

    let mut url = base
        .join(trimmed)
        .map_err(|e| UrlError::Parse(format!("{}: {}", trimmed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    Ok(url)
}

/// Extracts the comparable host of a URL: lowercase, without a leading `www.`
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let host = h.to_lowercase();
        match host.strip_prefix("www.") {
            Some(rest) => rest.to_string(),
            None => host,
        }
    })
}

/// Returns true if `url` is hosted somewhere other than `base`
pub fn is_external(url: &Url, base: &Url) -> bool {
    extract_domain(url) != extract_domain(base)
}

/// Returns the fragment of a raw reference, without the `#`
pub fn fragment_of(raw: &str) -> Option<&str> {
    raw.trim()
        .split_once('#')
        .map(|(_, fragment)| fragment)
        .filter(|fragment| !fragment.is_empty())
}
