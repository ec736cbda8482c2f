//! Source-position-aware start tag scanner
//!
//! A forgiving tokenizer that walks raw HTML and reports every start tag with the
//! byte ranges of its attribute values. It never fails: unterminated constructs
//! simply run to the end of the input.

use std::ops::Range;

/// Longest stretch of markup read as one element's content
const MAX_CONTENT_SCAN: usize = 4096;

/// Elements whose content is raw text rather than markup
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes", "noscript",
];

/// One attribute of a start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercase attribute name
    pub name: String,

    /// Byte range of the value, quotes excluded; `None` for a bare attribute
    pub value: Option<Range<usize>>,

    /// The quote character around the value, if any
    pub quote: Option<char>,
}

/// One start tag found in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Lowercase tag name
    pub name: String,

    /// Byte range of the whole tag, `<` through `>`
    pub span: Range<usize>,

    /// Attributes in source order; later duplicates of a name are dropped
    pub attributes: Vec<Attribute>,

    /// For raw text elements (`style`, `script`, ...), the range of their content
    pub raw_text: Option<Range<usize>>,
}

impl StartTag {
    /// Looks up an attribute by lowercase name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Scans raw HTML for start tags
///
/// Comments, doctypes, processing instructions and end tags are skipped, with
/// comments ending where an HTML parser ends them (`<!-->` and `<!--->` are
/// complete empty comments, `--!>` closes one too). The
/// content of raw text elements is not scanned for tags (a `<a>` inside a
/// `<script>` is not a link), matching how an HTML parser builds its tree.
///
/// # Examples
///
/// ```
/// use newsletter_relocator::markup::scan_tags;
///
/// let html = r#"<p><a class=x href="doc.pdf">Doc</a></p>"#;
/// let tags = scan_tags(html);
/// let href = tags[1].attribute("href").unwrap();
/// assert_eq!(&html[href.value.clone().unwrap()], "doc.pdf");
/// assert_eq!(href.quote, Some('"'));
/// ```
pub fn scan_tags(html: &str) -> Vec<StartTag> {
    let bytes = html.as_bytes();
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'<') {
        let lt = pos + offset;
        let next = bytes.get(lt + 1).copied();

        match next {
            Some(b'!') if bytes[lt..].starts_with(b"<!--") => {
                pos = comment_end(bytes, lt + 4);
            }
            Some(b'!') | Some(b'?') | Some(b'/') => {
                pos = find(bytes, lt + 2, b">").map_or(bytes.len(), |i| i + 1);
            }
            Some(b) if b.is_ascii_alphabetic() => {
                let mut tag = parse_start_tag(bytes, lt);
                pos = tag.span.end;

                if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                    let close = find_end_tag(bytes, pos, &tag.name).unwrap_or(bytes.len());
                    tag.raw_text = Some(pos..close);
                    pos = close;
                }

                tracing::trace!("scanned <{}> at {:?}", tag.name, tag.span);
                tags.push(tag);
            }
            _ => pos = lt + 1,
        }

        if pos >= bytes.len() {
            break;
        }
    }

    tags
}

/// Returns the range of markup between a start tag and the end of its element
///
/// The range stops at the first `</name`, at the next `<name` (an unclosed `<a>` is
/// implicitly closed by the next one) or after a bounded stretch of input.
pub fn element_content(html: &str, tag: &StartTag) -> Range<usize> {
    let bytes = html.as_bytes();
    let start = tag.span.end.min(bytes.len());
    let mut limit = (start + MAX_CONTENT_SCAN).min(bytes.len());
    while !html.is_char_boundary(limit) {
        limit -= 1;
    }

    let window = &bytes[..limit];
    let needle = tag.name.as_bytes();
    let mut pos = start;
    while let Some(lt) = find(window, pos, b"<") {
        let name_start = if window.get(lt + 1) == Some(&b'/') { lt + 2 } else { lt + 1 };
        let name_end = name_start + needle.len();
        if name_end <= window.len()
            && window[name_start..name_end].eq_ignore_ascii_case(needle)
            && window
                .get(name_end)
                .map_or(true, |&b| is_space(b) || b == b'>' || b == b'/')
        {
            return start..lt;
        }
        pos = lt + 1;
    }

    start..limit
}

/// Returns the offset just past a comment whose body starts at `from`
fn comment_end(bytes: &[u8], from: usize) -> usize {
    let body = &bytes[from..];
    if body.starts_with(b">") {
        return from + 1;
    }
    if body.starts_with(b"->") {
        return from + 2;
    }

    let dashes = find(bytes, from, b"-->").map(|i| i + 3);
    let bang = find(bytes, from, b"--!>").map(|i| i + 4);
    match (dashes, bang) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b).unwrap_or(bytes.len()),
    }
}

/// Parses a start tag beginning at `lt` (which points at `<`)
fn parse_start_tag(bytes: &[u8], lt: usize) -> StartTag {
    let mut i = lt + 1;
    let name_start = i;
    while i < bytes.len() && !is_space(bytes[i]) && bytes[i] != b'/' && bytes[i] != b'>' {
        i += 1;
    }
    let name = ascii_lower(&bytes[name_start..i]);

    let mut attributes: Vec<Attribute> = Vec::new();

    loop {
        while i < bytes.len() && (is_space(bytes[i]) || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        if bytes[i] == b'>' {
            i += 1;
            break;
        }

        // An attribute name may start with '=' in malformed input; always consume one byte
        let attr_start = i;
        i += 1;
        while i < bytes.len()
            && !is_space(bytes[i])
            && !matches!(bytes[i], b'/' | b'>' | b'=')
        {
            i += 1;
        }
        let attr_name = ascii_lower(&bytes[attr_start..i]);

        let mut cursor = i;
        while cursor < bytes.len() && is_space(bytes[cursor]) {
            cursor += 1;
        }

        let (value, quote) = if cursor < bytes.len() && bytes[cursor] == b'=' {
            cursor += 1;
            while cursor < bytes.len() && is_space(bytes[cursor]) {
                cursor += 1;
            }
            match bytes.get(cursor).copied() {
                Some(q @ (b'"' | b'\'')) => {
                    let start = cursor + 1;
                    let end = bytes[start..]
                        .iter()
                        .position(|&b| b == q)
                        .map_or(bytes.len(), |offset| start + offset);
                    i = (end + 1).min(bytes.len());
                    (Some(start..end), Some(q as char))
                }
                Some(_) => {
                    let start = cursor;
                    let mut end = start;
                    while end < bytes.len() && !is_space(bytes[end]) && bytes[end] != b'>' {
                        end += 1;
                    }
                    i = end;
                    (Some(start..end), None)
                }
                None => {
                    i = cursor;
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        if !attributes.iter().any(|a| a.name == attr_name) {
            attributes.push(Attribute {
                name: attr_name,
                value,
                quote,
            });
        }
    }

    StartTag {
        name,
        span: lt..i,
        attributes,
        raw_text: None,
    }
}

/// Finds `</name` (case-insensitive) at or after `from`
fn find_end_tag(bytes: &[u8], from: usize, name: &str) -> Option<usize> {
    let needle = name.as_bytes();
    let mut pos = from;
    while let Some(offset) = find(bytes, pos, b"</") {
        let start = offset + 2;
        let end = start + needle.len();
        if end <= bytes.len() && bytes[start..end].eq_ignore_ascii_case(needle) {
            let boundary = bytes.get(end).copied();
            if boundary.map_or(true, |b| is_space(b) || b == b'>' || b == b'/') {
                return Some(offset);
            }
        }
        pos = offset + 2;
    }
    None
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|offset| from + offset)
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn ascii_lower(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_ascii_lowercase()
}
