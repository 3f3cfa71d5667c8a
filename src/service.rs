//! Service facade over crawling, querying and truth-score updates
//!
//! [`SearchEngine`] is what an outer surface (the CLI here, an HTTP layer
//! elsewhere) talks to. It owns the configuration, the shared index and the
//! HTTP client, and validates caller input before doing any work.

use crate::config::{load_config_with_hash, Config};
use crate::crawler::{self, build_http_client, CrawlSummary, StopSignal};
use crate::index::{
    validate_truth_score, DocumentRecord, IndexStats, IndexStore, RunRecord, SqliteIndex,
    TermSuggestion,
};
use crate::query::{QueryEngine, SearchFilters, SearchResultPage};
use crate::url::normalize_url;
use crate::{Result, ValidationError};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;

pub struct SearchEngine {
    config: Config,
    config_hash: String,
    index: Arc<SqliteIndex>,
    client: Client,
}

impl SearchEngine {
    /// Wraps an already-open index
    pub fn new(config: Config, config_hash: String, index: Arc<SqliteIndex>) -> Result<Self> {
        let client = build_http_client(&config.user_agent)?;
        Ok(Self {
            config,
            config_hash,
            index,
            client,
        })
    }

    /// Opens the index at the configured database path
    pub fn open(config: Config, config_hash: String) -> Result<Self> {
        let index = SqliteIndex::open(Path::new(&config.index.database_path))?;
        tracing::debug!("Opened index at {}", config.index.database_path);
        Self::new(config, config_hash, Arc::new(index))
    }

    /// Loads and validates a config file, then opens its index
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let (config, hash) = load_config_with_hash(path)?;
        Self::open(config, hash)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &Arc<SqliteIndex> {
        &self.index
    }

    /// Crawls from `seed_url`, optionally overriding the configured page cap
    pub async fn start_crawl(
        &self,
        seed_url: &str,
        max_pages_override: Option<u32>,
    ) -> Result<CrawlSummary> {
        self.start_crawl_with_stop(seed_url, max_pages_override, StopSignal::new())
            .await
    }

    /// Like [`SearchEngine::start_crawl`], cancellable through `stop`
    pub async fn start_crawl_with_stop(
        &self,
        seed_url: &str,
        max_pages_override: Option<u32>,
        stop: StopSignal,
    ) -> Result<CrawlSummary> {
        let mut crawler_config = self.config.crawler.clone();
        match max_pages_override {
            Some(0) => return Err(ValidationError::InvalidMaxPages.into()),
            Some(max_pages) => crawler_config.max_pages = max_pages,
            None => {}
        }

        let index: Arc<dyn IndexStore> = self.index.clone();
        crawler::crawl(
            seed_url,
            &crawler_config,
            index,
            self.client.clone(),
            &self.config_hash,
            stop,
        )
        .await
    }

    pub fn search(
        &self,
        query: &str,
        page: usize,
        per_page: usize,
        filters: &SearchFilters,
    ) -> Result<SearchResultPage> {
        self.query_engine().search(query, page, per_page, filters)
    }

    /// Sets the truth score of the document stored under `url`
    ///
    /// Returns `Ok(false)` when no such document exists; nothing is created.
    pub fn update_truth_score(&self, url: &str, score: f64) -> Result<bool> {
        let score = validate_truth_score(score)?;
        let key = document_key(url);
        let updated = self.index.update_truth_score(&key, score)?;
        if updated {
            tracing::info!("Truth score of {} set to {}", key, score);
        } else {
            tracing::debug!("No document for {}; truth score not set", key);
        }
        Ok(updated)
    }

    pub fn get_stats(&self) -> Result<IndexStats> {
        Ok(self.index.stats()?)
    }

    pub fn suggest(&self, prefix: &str, limit: usize) -> Result<Vec<TermSuggestion>> {
        self.query_engine().suggest(prefix, limit)
    }

    pub fn document(&self, url: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.index.get_document_by_url(&document_key(url))?)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        Ok(self.index.recent_runs(limit)?)
    }

    fn query_engine(&self) -> QueryEngine<'_> {
        QueryEngine::new(self.index.as_ref(), &self.config.search)
    }
}

/// Documents are stored under their normalized URL; fall back to the raw
/// string so lookups of unnormalizable input simply miss
fn document_key(url: &str) -> String {
    normalize_url(url).map_or_else(|_| url.trim().to_string(), |u| u.to_string())
}
