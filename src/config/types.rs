use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for TrueGL
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Crawl session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Stop once this many pages have been indexed
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Maximum depth to crawl from the seed URL (seed is depth 0)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Minimum time between fetches to the same host (milliseconds)
    #[serde(rename = "crawl-delay")]
    pub crawl_delay: u64,

    /// Retries allowed after a transient fetch failure
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Per-fetch timeout (milliseconds)
    pub timeout: u64,

    /// Number of concurrent fetch workers
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Base delay before a retry; multiplied by the attempt number (milliseconds)
    #[serde(rename = "retry-backoff", default = "default_retry_backoff")]
    pub retry_backoff: u64,

    /// Hosts the crawl may visit; empty means unrestricted
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,
}

impl CrawlerConfig {
    pub fn crawl_delay(&self) -> Duration {
        Duration::from_millis(self.crawl_delay)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff.saturating_mul(u64::from(attempt)))
    }
}

fn default_concurrency() -> u32 {
    4
}

fn default_retry_backoff() -> u64 {
    1000
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Index storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Query-side limits and presentation
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(rename = "default-per-page", default = "default_per_page")]
    pub default_per_page: usize,

    #[serde(rename = "max-per-page", default = "default_max_per_page")]
    pub max_per_page: usize,

    /// Approximate snippet width in characters
    #[serde(rename = "snippet-length", default = "default_snippet_length")]
    pub snippet_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            snippet_length: default_snippet_length(),
        }
    }
}

fn default_per_page() -> usize {
    10
}

fn default_max_per_page() -> usize {
    50
}

fn default_snippet_length() -> usize {
    160
}
