//! Crawler module for web page fetching and indexing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with transient-failure classification
//! - Request scheduling, per-host politeness and page-slot reservations
//! - The concurrent worker pool that feeds pages to the extractor and index

mod coordinator;
mod fetcher;
mod scheduler;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, fetch_page, FetchError, FetchedPage};
pub use scheduler::{CrawlCounters, Next, PageOutcome, Scheduler};

use crate::config::CrawlerConfig;
use crate::index::IndexStore;
use crate::url::normalize_url;
use crate::{Result, ValidationError};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Cooperative cancellation for a running crawl
///
/// Clones share one flag. Once stopped, no new fetches are dispatched;
/// fetches already in flight finish or time out.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one crawl session
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub run_id: i64,
    pub seed_url: String,
    pub pages_fetched: u64,
    pub pages_indexed: u64,
    pub pages_failed: u64,
    /// Policy rejections plus URLs still queued when the session ended
    pub pages_skipped: u64,
    /// Rediscovered URLs; not counted as skipped
    pub duplicates_ignored: u64,
    pub retries: u64,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Runs one crawl session starting at `seed_url`
///
/// The seed is normalized first; a seed that cannot be normalized is a
/// validation error and no run is recorded. Everything after that is
/// recorded as a crawl run, and individual page failures only show up in
/// the summary counters.
pub async fn crawl(
    seed_url: &str,
    config: &CrawlerConfig,
    index: Arc<dyn IndexStore>,
    client: Client,
    config_hash: &str,
    stop: StopSignal,
) -> Result<CrawlSummary> {
    let seed = normalize_url(seed_url).map_err(|e| ValidationError::InvalidSeedUrl {
        url: seed_url.to_string(),
        reason: e.to_string(),
    })?;

    Coordinator::new(seed, config.clone(), index, client, config_hash, stop)?
        .run()
        .await
}
