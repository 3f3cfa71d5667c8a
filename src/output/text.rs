//! Plain-text rendering of crawl summaries, result pages and index stats

use crate::crawler::CrawlSummary;
use crate::index::{DocumentRecord, IndexStats, RunRecord, TermSuggestion};
use crate::query::SearchResultPage;

/// Formats a crawl summary for the terminal
pub fn format_crawl_summary(summary: &CrawlSummary) -> String {
    let mut out = String::new();
    out.push_str("=== Crawl Summary ===\n\n");
    out.push_str(&format!("Run ID: {}\n", summary.run_id));
    out.push_str(&format!("Seed: {}\n", summary.seed_url));
    out.push_str(&format!("Started: {}\n", summary.started_at.to_rfc3339()));
    out.push_str(&format!(
        "Duration: {:.2} seconds\n",
        summary.elapsed.as_secs_f64()
    ));
    if summary.cancelled {
        out.push_str("Status: cancelled\n");
    }

    out.push_str("\nPages:\n");
    out.push_str(&format!("  Fetched: {}\n", summary.pages_fetched));
    out.push_str(&format!("  Indexed: {}\n", summary.pages_indexed));
    out.push_str(&format!("  Failed: {}\n", summary.pages_failed));
    out.push_str(&format!("  Skipped: {}\n", summary.pages_skipped));
    out.push_str(&format!("  Duplicates ignored: {}\n", summary.duplicates_ignored));
    out.push_str(&format!("  Retries: {}\n", summary.retries));

    let attempted = summary.pages_indexed + summary.pages_failed;
    if attempted > 0 {
        out.push_str(&format!(
            "\nSuccess Rate: {:.1}% ({} / {} pages indexed)\n",
            summary.pages_indexed as f64 / attempted as f64 * 100.0,
            summary.pages_indexed,
            attempted
        ));
    }
    out
}

/// Formats one page of search results
pub fn format_search_results(query: &str, page: &SearchResultPage) -> String {
    if page.total_matches == 0 {
        return format!("No results for \"{}\"\n", query);
    }

    let mut out = format!(
        "{} results for \"{}\" (page {} of {})\n\n",
        page.total_matches, query, page.page, page.total_pages
    );

    let first_rank = (page.page - 1) * page.per_page + 1;
    for (offset, hit) in page.results.iter().enumerate() {
        out.push_str(&format!("{:>3}. {}\n", first_rank + offset, hit.title));
        out.push_str(&format!("     {}\n", hit.url));
        out.push_str(&format!(
            "     score {:.4} (relevance {:.4}, truth {:.2})\n",
            hit.score, hit.relevance, hit.truth_score
        ));
        if !hit.snippet.is_empty() {
            out.push_str(&format!("     {}\n", hit.snippet));
        }
        out.push('\n');
    }

    if page.results.is_empty() {
        out.push_str(&format!("(page {} is past the last page)\n", page.page));
    }
    out
}

/// Formats index statistics and the most recent crawl runs
pub fn format_stats(stats: &IndexStats, runs: &[RunRecord]) -> String {
    let mut out = String::new();
    out.push_str("=== Index Statistics ===\n\n");
    out.push_str("Overview:\n");
    out.push_str(&format!("  Documents: {}\n", stats.document_count));
    out.push_str(&format!("  Distinct terms: {}\n", stats.term_count));
    out.push_str(&format!("  Postings: {}\n", stats.posting_count));
    out.push_str(&format!("  Crawl runs: {}\n", stats.run_count));
    out.push_str(&format!(
        "  Storage size: {}\n",
        format_bytes(stats.storage_size_bytes)
    ));
    match stats.last_crawl_time {
        Some(at) => out.push_str(&format!("  Last crawl: {}\n", at.to_rfc3339())),
        None => out.push_str("  Last crawl: never\n"),
    }

    if !runs.is_empty() {
        out.push_str("\nRecent Runs:\n");
        for run in runs {
            out.push_str(&format!(
                "  #{} {} [{}] indexed {}, failed {}, skipped {}\n",
                run.id,
                run.seed_url,
                run.status.to_db_string(),
                run.pages_indexed,
                run.pages_failed,
                run.pages_skipped
            ));
        }
    }
    out
}

pub fn format_suggestions(prefix: &str, suggestions: &[TermSuggestion]) -> String {
    if suggestions.is_empty() {
        return format!("No indexed terms start with \"{}\"\n", prefix);
    }
    let mut out = String::new();
    for suggestion in suggestions {
        out.push_str(&format!(
            "{} ({} documents)\n",
            suggestion.term, suggestion.document_frequency
        ));
    }
    out
}

pub fn format_document(doc: &DocumentRecord) -> String {
    let mut out = format!("{}\n", doc.title);
    out.push_str(&format!("  URL: {}\n", doc.url));
    out.push_str(&format!("  Host: {}\n", doc.host));
    out.push_str(&format!("  Content type: {}\n", doc.content_type));
    out.push_str(&format!("  Depth: {}\n", doc.depth));
    out.push_str(&format!("  Crawled: {}\n", doc.crawled_at.to_rfc3339()));
    out.push_str(&format!("  Truth score: {:.2}\n", doc.truth_score));
    out.push_str(&format!("  Size: {}\n", format_bytes(doc.size_bytes)));
    if let Some(language) = &doc.language {
        out.push_str(&format!("  Language: {}\n", language));
    }
    for (key, value) in &doc.metadata {
        out.push_str(&format!("  {}: {}\n", key, value));
    }
    out.push_str(&format!("  Body: {} characters\n", doc.body.chars().count()));
    out
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
