//! Index storage
//!
//! The index is a SQLite database holding:
//! - documents keyed by normalized URL, with their extracted text and truth score
//! - postings (term -> document, frequency, positions) derived from document bodies
//! - crawl runs and the per-page crawl log
//!
//! [`IndexStore`] is the seam the crawler and query engine depend on;
//! [`SqliteIndex`] is the implementation.

mod schema;
mod sqlite;
pub mod tokenizer;
mod traits;

pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteIndex;
pub use traits::{IndexStore, StorageError, StorageResult};

use crate::state::PageState;
use crate::ValidationError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub type DocumentId = i64;

/// Truth score of a document nobody has rated yet
pub const DEFAULT_TRUTH_SCORE: f64 = 0.5;

/// Rejects truth scores outside `[0.0, 1.0]`, including NaN
pub fn validate_truth_score(score: f64) -> Result<f64, ValidationError> {
    if (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(ValidationError::TruthScoreOutOfRange(score))
    }
}

/// A freshly extracted document ready to be indexed
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub url: String,
    pub host: String,
    pub title: String,
    pub body: String,
    pub content_type: String,
    pub depth: u32,
    pub crawled_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub language: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// A stored document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub url: String,
    pub host: String,
    pub title: String,
    pub body: String,
    pub content_type: String,
    pub depth: u32,
    pub crawled_at: DateTime<Utc>,
    pub truth_score: f64,
    pub size_bytes: u64,
    pub language: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingHit {
    pub document_id: DocumentId,
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingSignals {
    pub document_id: DocumentId,
    pub url: String,
    pub host: String,
    pub crawled_at: DateTime<Utc>,
    pub truth_score: f64,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermSuggestion {
    pub term: String,
    pub document_frequency: u64,
}

/// Aggregate view of the index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub document_count: u64,
    pub last_crawl_time: Option<DateTime<Utc>>,
    pub storage_size_bytes: u64,
    pub term_count: u64,
    pub posting_count: u64,
    pub run_count: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Final counters written when a run finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub pages_fetched: u64,
    pub pages_indexed: u64,
    pub pages_failed: u64,
    pub pages_skipped: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: i64,
    pub seed_url: String,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub pages_fetched: u64,
    pub pages_indexed: u64,
    pub pages_failed: u64,
    pub pages_skipped: u64,
}

/// One finished page of a crawl run
#[derive(Debug, Clone)]
pub struct PageLogEntry {
    pub run_id: i64,
    pub url: String,
    pub depth: u32,
    pub outcome: PageState,
    pub attempts: u32,
    pub error_message: Option<String>,
}
