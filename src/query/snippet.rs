//! Result snippets: a window of body text around the first query-term hit

const ELLIPSIS: &str = "…";

/// Cuts roughly `width` characters of `body` around byte offset `anchor`
///
/// The window starts about a third of its width before the anchor and is
/// trimmed to whole words. Without an anchor the snippet is the start of the
/// body. Ellipses mark truncated ends.
pub fn build_snippet(body: &str, anchor: Option<usize>, width: usize) -> String {
    if body.is_empty() || width == 0 {
        return String::new();
    }

    let anchor = anchor
        .filter(|&a| a < body.len() && body.is_char_boundary(a))
        .unwrap_or(0);

    let lead = width / 3;
    let mut start = body[..anchor]
        .char_indices()
        .rev()
        .take(lead)
        .last()
        .map_or(anchor, |(i, _)| i);
    let mut end = body[start..]
        .char_indices()
        .nth(width)
        .map_or(body.len(), |(i, _)| start + i);

    if start > 0 && !body[..start].ends_with(char::is_whitespace) {
        if let Some(space) = body[start..anchor].find(char::is_whitespace) {
            start += space;
        }
    }
    if end < body.len() && !body[end..].starts_with(char::is_whitespace) {
        if let Some(space) = body[anchor..end].rfind(char::is_whitespace) {
            end = anchor + space;
        }
    }

    let text = body[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
    let mut snippet = String::with_capacity(text.len() + 2 * ELLIPSIS.len());
    if start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(&text);
    if end < body.len() {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}
