//! URL handling: normalization, host extraction and allow-list matching
//!
//! Every URL that enters the frontier or the index passes through
//! [`normalize_url`] first, so the normalized string is the identity used for
//! dedup and as the document key.

mod matcher;
mod normalize;

use url::Url;

pub use matcher::{host_allowed, matches_wildcard};
pub use normalize::normalize_url;

/// Returns the lowercase host of a URL, if it has one
///
/// ```
/// use url::Url;
/// use truegl::url::extract_domain;
///
/// let url = Url::parse("https://Docs.Example.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("docs.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain_ignores_port_and_path() {
        let url = Url::parse("http://127.0.0.1:4040/a/b?c=d").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_extract_domain_without_host() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        assert_eq!(extract_domain(&url), None);
    }
}
