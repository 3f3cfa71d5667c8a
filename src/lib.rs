//! TrueGL: crawl, index and rank web pages with a per-document truth score
//!
//! This crate implements a breadth-first web crawler that extracts page text into a
//! SQLite inverted index, and a query engine that ranks documents by term relevance
//! blended with an externally supplied truth score.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod frontier;
pub mod index;
pub mod output;
pub mod query;
pub mod service;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for TrueGL operations
#[derive(Debug, Error)]
pub enum TrueglError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] index::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Crawl worker failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Caller input rejected before any work is attempted
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("search query cannot be empty")]
    EmptyQuery,

    #[error("page must be >= 1, got {0}")]
    InvalidPage(usize),

    #[error("per_page must be between 1 and {max}, got {got}")]
    InvalidPerPage { got: usize, max: usize },

    #[error("truth score must be within [0.0, 1.0], got {0}")]
    TruthScoreOutOfRange(f64),

    #[error("invalid seed URL '{url}': {reason}")]
    InvalidSeedUrl { url: String, reason: String },

    #[error("max pages override must be >= 1")]
    InvalidMaxPages,

    #[error("crawled_after must not be later than crawled_before")]
    InvalidDateRange,

    #[error("suggestion prefix must contain at least {min} characters")]
    PrefixTooShort { min: usize },
}

/// Result type alias for TrueGL operations
pub type Result<T> = std::result::Result<T, TrueglError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlSummary, StopSignal};
pub use index::{IndexStats, IndexStore, SqliteIndex};
pub use query::{SearchFilters, SearchHit, SearchResultPage};
pub use service::SearchEngine;
pub use url::{extract_domain, normalize_url};
