//! Output module for presenting results on the command line
//!
//! This module handles:
//! - Human-readable summaries of crawls, searches and index statistics
//! - JSON output of the same values for scripting

mod text;

pub use text::{
    format_crawl_summary, format_document, format_search_results, format_stats,
    format_suggestions,
};

use crate::crawler::CrawlSummary;
use crate::index::{DocumentRecord, IndexStats, RunRecord, TermSuggestion};
use crate::query::SearchResultPage;
use serde::Serialize;

/// Prints any serializable value as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_crawl_summary(summary: &CrawlSummary) {
    print!("{}", format_crawl_summary(summary));
}

pub fn print_search_results(query: &str, page: &SearchResultPage) {
    print!("{}", format_search_results(query, page));
}

pub fn print_stats(stats: &IndexStats, runs: &[RunRecord]) {
    print!("{}", format_stats(stats, runs));
}

pub fn print_suggestions(prefix: &str, suggestions: &[TermSuggestion]) {
    print!("{}", format_suggestions(prefix, suggestions));
}

pub fn print_document(doc: &DocumentRecord) {
    print!("{}", format_document(doc));
}
