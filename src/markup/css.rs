use std::ops::Range;

/// A `url(...)` reference found in CSS text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssUrl<'a> {
    /// Byte range of the URL itself, quotes excluded
    pub span: Range<usize>,

    /// The URL text
    pub value: &'a str,
}

/// Finds every `url(...)` reference in a chunk of CSS
///
/// Quoted (`url("a.png")`, `url('a.png')`) and unquoted (`url(a.png)`) forms are
/// recognized; the function name is matched case-insensitively. Empty references
/// are skipped.
///
/// # Examples
///
/// ```
/// use newsletter_relocator::markup::css_urls;
///
/// let css = "background: URL( 'bg.png' ) no-repeat";
/// let urls = css_urls(css);
/// assert_eq!(urls.len(), 1);
/// assert_eq!(urls[0].value, "bg.png");
/// assert_eq!(&css[urls[0].span.clone()], "bg.png");
/// ```
pub fn css_urls(css: &str) -> Vec<CssUrl<'_>> {
    let bytes = css.as_bytes();
    let mut found = Vec::new();
    let mut pos = 0;

    while pos + 4 <= bytes.len() {
        if !bytes[pos..pos + 4].eq_ignore_ascii_case(b"url(") || is_ident_byte_before(bytes, pos) {
            pos += 1;
            continue;
        }

        let mut cursor = pos + 4;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            break;
        }

        let (start, end, next) = match bytes[cursor] {
            quote @ (b'"' | b'\'') => {
                let start = cursor + 1;
                let end = bytes[start..]
                    .iter()
                    .position(|&b| b == quote)
                    .map_or(bytes.len(), |offset| start + offset);
                (start, end, end + 1)
            }
            _ => {
                let start = cursor;
                let close = bytes[start..]
                    .iter()
                    .position(|&b| b == b')')
                    .map_or(bytes.len(), |offset| start + offset);
                let mut end = close;
                while end > start && bytes[end - 1].is_ascii_whitespace() {
                    end -= 1;
                }
                (start, end, close + 1)
            }
        };

        if end > start {
            found.push(CssUrl {
                span: start..end,
                value: &css[start..end],
            });
        }

        pos = next.max(pos + 4);
    }

    found
}

/// `myurl(` is not a `url(` token
fn is_ident_byte_before(bytes: &[u8], pos: usize) -> bool {
    pos > 0 && {
        let b = bytes[pos - 1];
        b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
    }
}
