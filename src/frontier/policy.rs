use crate::config::CrawlerConfig;
use crate::url::{extract_domain, host_allowed, normalize_url};
use thiserror::Error;
use url::Url;

/// Why a candidate URL was not admitted to the frontier
///
/// Rejections never reach callers; the crawler logs and counts them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyRejection {
    #[error("malformed URL: {0}")]
    Malformed(String),

    #[error("depth {depth} exceeds max depth {max}")]
    DepthExceeded { depth: u32, max: u32 },

    #[error("host '{0}' is not in the allow-list")]
    DomainNotAllowed(String),

    #[error("already queued, fetched or rejected")]
    AlreadySeen,
}

impl PolicyRejection {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::AlreadySeen)
    }
}

/// Stateless admission rules for a crawl session
#[derive(Debug, Clone)]
pub struct CrawlPolicy {
    max_depth: u32,
    allowed_domains: Vec<String>,
}

impl CrawlPolicy {
    pub fn new(max_depth: u32, allowed_domains: Vec<String>) -> Self {
        Self {
            max_depth,
            allowed_domains: allowed_domains
                .into_iter()
                .map(|d| d.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.max_depth, config.allowed_domains.clone())
    }

    /// Normalizes `raw` and applies the depth and allow-list rules
    pub fn check(&self, raw: &str, depth: u32) -> Result<Url, PolicyRejection> {
        let url = Self::normalize(raw)?;
        self.evaluate(&url, depth)?;
        Ok(url)
    }

    pub(crate) fn normalize(raw: &str) -> Result<Url, PolicyRejection> {
        normalize_url(raw).map_err(|e| PolicyRejection::Malformed(e.to_string()))
    }

    /// Applies the rules to an already-normalized URL
    pub(crate) fn evaluate(&self, url: &Url, depth: u32) -> Result<(), PolicyRejection> {
        if depth > self.max_depth {
            return Err(PolicyRejection::DepthExceeded {
                depth,
                max: self.max_depth,
            });
        }

        let host = extract_domain(url)
            .ok_or_else(|| PolicyRejection::Malformed(format!("no host in {}", url)))?;

        if !host_allowed(&host, &self.allowed_domains) {
            return Err(PolicyRejection::DomainNotAllowed(host));
        }

        Ok(())
    }
}
