use std::ops::Range;

/// Returns the byte range of every candidate URL in a `srcset` value
///
/// Follows the HTML candidate-string rules closely enough for real newsletters:
/// candidates are separated by commas, each URL is a run of non-whitespace, and a
/// URL that ends in commas has them stripped (it had no descriptor).
///
/// # Examples
///
/// ```
/// use newsletter_relocator::markup::srcset_urls;
///
/// let srcset = "small.jpg 480w, large.jpg 1080w";
/// let urls: Vec<&str> = srcset_urls(srcset).into_iter().map(|r| &srcset[r]).collect();
/// assert_eq!(urls, vec!["small.jpg", "large.jpg"]);
/// ```
pub fn srcset_urls(srcset: &str) -> Vec<Range<usize>> {
    let bytes = srcset.as_bytes();
    let mut ranges = Vec::new();
    let mut pos = 0;

    loop {
        while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b',') {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let mut end = pos;
        let had_trailing_comma = bytes[end - 1] == b',';
        while end > start && bytes[end - 1] == b',' {
            end -= 1;
        }
        if end > start {
            ranges.push(start..end);
        }

        if !had_trailing_comma {
            // Skip the descriptor up to the next candidate
            while pos < bytes.len() && bytes[pos] != b',' {
                pos += 1;
            }
        }
    }

    ranges
}
