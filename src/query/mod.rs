//! Query engine
//!
//! Queries are tokenized with the indexing tokenizer, matched with OR
//! semantics against the postings, scored by [`ranking`], ordered
//! deterministically and paginated.

mod engine;
pub mod ranking;
mod snippet;

pub use engine::{QueryEngine, MIN_SUGGEST_PREFIX};
pub use ranking::RANKING_FORMULA_VERSION;
pub use snippet::build_snippet;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Optional restrictions applied to the candidate set before ranking
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Every one of these terms must occur in the document
    pub required_terms: Vec<String>,
    /// Host patterns, exact or `*.example.com`
    pub domains: Vec<String>,
    pub crawled_after: Option<DateTime<Utc>>,
    pub crawled_before: Option<DateTime<Utc>>,
    /// Language tag; compared on the primary subtag, so `en` matches `en-US`
    pub language: Option<String>,
    pub min_truth_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document_id: i64,
    pub url: String,
    pub host: String,
    pub title: String,
    pub snippet: String,
    /// Final score: relevance blended with the truth score
    pub score: f64,
    pub relevance: f64,
    pub truth_score: f64,
    pub crawled_at: DateTime<Utc>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResultPage {
    pub results: Vec<SearchHit>,
    pub total_matches: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub ranking_version: u32,
}

impl SearchResultPage {
    pub(crate) fn empty(page: usize, per_page: usize) -> Self {
        Self {
            results: Vec::new(),
            total_matches: 0,
            page,
            per_page,
            total_pages: 0,
            ranking_version: RANKING_FORMULA_VERSION,
        }
    }
}
