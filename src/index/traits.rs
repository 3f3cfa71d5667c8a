//! Index store trait and error types

use super::{
    DocumentId, DocumentRecord, IndexStats, NewDocument, PageLogEntry, PostingHit,
    RankingSignals, RunRecord, RunStatus, RunTotals, TermSuggestion,
};
use thiserror::Error;

/// Errors that can occur during index operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid timestamp in column {column}: {value}")]
    InvalidTimestamp { column: &'static str, value: String },

    #[error("Index lock poisoned")]
    LockPoisoned,
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent inverted index
///
/// Implementations serialize writers internally, so every method takes
/// `&self` and the store can be shared across crawl workers behind an `Arc`.
/// Readers only ever observe committed state.
pub trait IndexStore: Send + Sync {
    // ===== Documents =====

    /// Inserts or replaces a document and regenerates its postings atomically
    ///
    /// An existing document keeps its truth score.
    fn upsert_document(&self, doc: &NewDocument) -> StorageResult<DocumentId>;

    /// Sets the truth score of the document at `url`; false if no such document
    fn update_truth_score(&self, url: &str, score: f64) -> StorageResult<bool>;

    fn get_document(&self, id: DocumentId) -> StorageResult<DocumentRecord>;

    fn get_document_by_url(&self, url: &str) -> StorageResult<Option<DocumentRecord>>;

    fn document_count(&self) -> StorageResult<u64>;

    // ===== Postings =====

    fn lookup_postings(&self, term: &str) -> StorageResult<Vec<PostingHit>>;

    /// Word positions of `term` in a document, empty if it does not occur
    fn term_positions(&self, term: &str, id: DocumentId) -> StorageResult<Vec<u32>>;

    /// Per-document fields the ranker and filters need, without bodies
    fn ranking_signals(&self, ids: &[DocumentId]) -> StorageResult<Vec<RankingSignals>>;

    /// Indexed terms starting with `prefix`, most widespread first
    fn suggest_terms(&self, prefix: &str, limit: usize) -> StorageResult<Vec<TermSuggestion>>;

    fn stats(&self) -> StorageResult<IndexStats>;

    // ===== Crawl runs =====

    fn begin_run(&self, seed_url: &str, config_hash: &str) -> StorageResult<i64>;

    fn finish_run(&self, run_id: i64, status: RunStatus, totals: &RunTotals) -> StorageResult<()>;

    fn record_page(&self, entry: &PageLogEntry) -> StorageResult<()>;

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
