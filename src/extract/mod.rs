//! Content extraction
//!
//! Turns the raw bytes of a fetched response into indexable text. Extraction is
//! pure: it performs no network or storage access, so the crawler can call it
//! from any worker.
//!
//! - HTML (`text/html`, `application/xhtml+xml`) yields the visible text, title,
//!   metadata and absolute outbound links.
//! - Other textual types (`text/*`, JSON, XML) pass through as plain text with
//!   no links.
//! - A missing content type is sniffed from the body.
//! - Anything else is rejected as unsupported.

mod decode;
mod html;

use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Longest title taken from the first line of a plain-text document
const PLAIN_TITLE_MAX_CHARS: usize = 120;

/// Errors raised while turning a response body into text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("content is not valid {charset}: {reason}")]
    Undecodable { charset: String, reason: String },

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
}

/// Text and structure recovered from one document
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    /// `<title>`, first line of plain text, or the URL when neither exists
    pub title: String,
    pub body_text: String,
    /// Absolute http(s) URLs in document order
    pub outbound_links: Vec<String>,
    /// description, author, keywords, language, canonical (HTML only)
    pub metadata: BTreeMap<String, String>,
    /// MIME type without parameters
    pub content_type: String,
}

impl ExtractedPage {
    pub fn language(&self) -> Option<&str> {
        self.metadata.get("language").map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Html,
    Text,
}

/// Extracts title, body text, links and metadata from a response body
///
/// ```
/// use truegl::extract::extract;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/").unwrap();
/// let page = extract(
///     b"<html><head><title>Hi</title></head><body><a href='/next'>go</a></body></html>",
///     Some("text/html; charset=utf-8"),
///     &base,
/// )
/// .unwrap();
/// assert_eq!(page.title, "Hi");
/// assert_eq!(page.outbound_links, vec!["https://example.com/next"]);
/// ```
pub fn extract(
    raw: &[u8],
    content_type: Option<&str>,
    base_url: &Url,
) -> Result<ExtractedPage, ExtractionError> {
    extract_document(raw, content_type, base_url, base_url)
}

/// Like [`extract`], but a missing title falls back to `document_url`
/// while links still resolve against `base_url` (the post-redirect URL)
pub fn extract_document(
    raw: &[u8],
    content_type: Option<&str>,
    base_url: &Url,
    document_url: &Url,
) -> Result<ExtractedPage, ExtractionError> {
    let (mime, header_charset) = content_type
        .map(decode::parse_content_type)
        .filter(|(mime, _)| !mime.is_empty())
        .map_or((None, None), |(mime, charset)| (Some(mime), charset));

    let kind = match mime.as_deref() {
        Some(mime) => classify(mime)?,
        None => sniff(raw),
    };

    let charset = header_charset.or_else(|| match kind {
        ContentKind::Html => decode::sniff_meta_charset(raw),
        ContentKind::Text => None,
    });
    let text = decode::decode(raw, charset.as_deref())?;

    let page = match kind {
        ContentKind::Html => {
            let parts = html::parse_html(&text, base_url);
            ExtractedPage {
                title: parts.title.unwrap_or_else(|| document_url.to_string()),
                body_text: parts.body_text,
                outbound_links: parts.links,
                metadata: parts.metadata,
                content_type: mime.unwrap_or_else(|| "text/html".to_string()),
            }
        }
        ContentKind::Text => ExtractedPage {
            title: first_line_title(&text).unwrap_or_else(|| document_url.to_string()),
            body_text: text,
            outbound_links: Vec::new(),
            metadata: BTreeMap::new(),
            content_type: mime.unwrap_or_else(|| "text/plain".to_string()),
        },
    };

    Ok(page)
}

/// Best-effort link scan over bytes that failed extraction
pub fn recover_links(raw: &[u8], base_url: &Url) -> Vec<String> {
    html::scan_links(&String::from_utf8_lossy(raw), base_url)
}

fn classify(mime: &str) -> Result<ContentKind, ExtractionError> {
    match mime {
        "text/html" | "application/xhtml+xml" => Ok(ContentKind::Html),
        m if m.starts_with("text/") => Ok(ContentKind::Text),
        "application/json" | "application/xml" => Ok(ContentKind::Text),
        m if m.ends_with("+json") || m.ends_with("+xml") => Ok(ContentKind::Text),
        other => Err(ExtractionError::UnsupportedContentType(other.to_string())),
    }
}

fn sniff(raw: &[u8]) -> ContentKind {
    let head = &raw[..raw.len().min(512)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start().to_ascii_lowercase();

    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        ContentKind::Html
    } else {
        ContentKind::Text
    }
}

fn first_line_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(PLAIN_TITLE_MAX_CHARS).collect())
}
