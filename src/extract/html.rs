//! HTML extraction with `scraper`
//!
//! Produces the visible body text, the title, metadata and the outbound links
//! of a document.

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::BTreeMap;
use url::Url;

/// Elements whose contents never count as visible text
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template", "svg"];

/// Elements that separate words even without surrounding whitespace
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Parsed pieces of an HTML document
#[derive(Debug, Clone)]
pub(crate) struct HtmlParts {
    pub title: Option<String>,
    pub body_text: String,
    pub links: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

pub(crate) fn parse_html(html: &str, base_url: &Url) -> HtmlParts {
    let document = Html::parse_document(html);

    HtmlParts {
        title: extract_title(&document),
        body_text: extract_text(&document),
        links: extract_links(&document, base_url),
        metadata: extract_metadata(&document, base_url),
    }
}

/// Link scan only, used to salvage links from undecodable pages
pub(crate) fn scan_links(html: &str, base_url: &Url) -> Vec<String> {
    extract_links(&Html::parse_document(html), base_url)
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_text(document: &Html) -> String {
    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }

    let block = BLOCK_ELEMENTS.contains(&name);
    if block {
        out.push(' ');
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push(' ');
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collects `<a href>` targets and canonical links as absolute URLs
///
/// Excluded: `download` anchors, `javascript:`, `mailto:`, `tel:` and `data:`
/// targets, same-page fragments and anything that does not resolve to http(s).
/// `rel="nofollow"` links are followed. Each URL appears once, in document order.
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();

    let mut push = |href: &str| {
        if let Some(absolute) = resolve_link(href, base_url) {
            if !links.contains(&absolute) {
                links.push(absolute);
            }
        }
    };

    if let Some(anchors) = selector("a[href]") {
        for element in document.select(&anchors) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Some(canonical) = selector("link[rel='canonical'][href]") {
        for element in document.select(&canonical) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}

fn extract_metadata(document: &Html, base_url: &Url) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    for name in ["description", "author", "keywords"] {
        if let Some(value) = meta_content(document, name) {
            metadata.insert(name.to_string(), value);
        }
    }

    let language = selector("html[lang]").and_then(|s| {
        document
            .select(&s)
            .next()
            .and_then(|el| el.value().attr("lang"))
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty())
    });
    if let Some(language) = language {
        metadata.insert("language".to_string(), language);
    }

    let canonical = selector("link[rel='canonical'][href]").and_then(|s| {
        document
            .select(&s)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| resolve_link(href, base_url))
    });
    if let Some(canonical) = canonical {
        metadata.insert("canonical".to_string(), canonical);
    }

    metadata
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    let meta = selector("meta[name][content]")?;

    document
        .select(&meta)
        .filter(|el| {
            el.value()
                .attr("name")
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .find_map(|el: ElementRef<'_>| el.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}
