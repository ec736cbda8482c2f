use scraper::{ElementRef, Html};
use std::borrow::Cow;

/// Attribute used to carry a value through the parser
const CARRIER: &str = "data-value";

/// Decodes the character references in an attribute value
///
/// The value is run through the HTML parser as an attribute of a throwaway
/// fragment, so every HTML5 named reference (`&sol;`, `&lowbar;`, ...) and the
/// attribute-specific rules for references without a semicolon behave exactly as
/// in a browser. A bare `&` in a query string is left untouched.
///
/// # Examples
///
/// ```
/// use newsletter_relocator::markup::decode_entities;
///
/// assert_eq!(decode_entities("get?a=1&amp;b=2"), "get?a=1&b=2");
/// assert_eq!(decode_entities("get?a=1&b=2"), "get?a=1&b=2");
/// assert_eq!(decode_entities("files&sol;report.pdf"), "files/report.pdf");
/// ```
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    // `&quot;` decodes back to the quote, and ends a preceding reference the same way
    let markup = format!("<a {}=\"{}\">", CARRIER, input.replace('"', "&quot;"));
    let fragment = Html::parse_fragment(&markup);
    let decoded = fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find_map(|element| element.value().attr(CARRIER).map(str::to_string));

    match decoded {
        Some(value) => Cow::Owned(value),
        None => Cow::Borrowed(input),
    }
}

/// Escapes a URL for writing back into an attribute value
///
/// `quote` is the quote character the original attribute used, or `None` for an
/// unquoted value, in which case characters that would end the value are
/// percent-encoded instead.
pub fn escape_attribute(value: &str, quote: Option<char>) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match (c, quote) {
            ('&', _) => out.push_str("&amp;"),
            ('"', Some('"')) | ('"', None) => out.push_str("&quot;"),
            ('\'', Some('\'')) | ('\'', None) => out.push_str("&#39;"),
            (' ', None) => out.push_str("%20"),
            ('>', None) => out.push_str("%3E"),
            ('<', None) => out.push_str("%3C"),
            ('`', None) => out.push_str("%60"),
            _ => out.push(c),
        }
    }
    out
}
