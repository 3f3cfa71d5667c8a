/// Checks whether a host matches a domain pattern
///
/// Patterns are either an exact host (`example.com`) or a wildcard
/// (`*.example.com`). A wildcard matches the base host itself and any
/// subdomain beneath it. Both sides are expected in lowercase.
///
/// ```
/// use truegl::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            host == base
                || host
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => host == pattern,
    }
}

/// Returns true when `host` is permitted by the allow-list
///
/// An empty allow-list permits every host.
pub fn host_allowed<S: AsRef<str>>(host: &str, patterns: &[S]) -> bool {
    patterns.is_empty()
        || patterns
            .iter()
            .any(|pattern| matches_wildcard(pattern.as_ref(), host))
}
