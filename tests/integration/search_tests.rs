//! Integration tests for indexing and ranked search
//!
//! Documents are written straight into an in-memory index and queried through
//! the service facade, the same path the CLI takes.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use truegl::config::{Config, CrawlerConfig, IndexConfig, SearchConfig, UserAgentConfig};
use truegl::index::{tokenizer, IndexStore, NewDocument};
use truegl::query::RANKING_FORMULA_VERSION;
use truegl::{SearchEngine, SearchFilters, SqliteIndex, TrueglError, ValidationError};

fn create_test_config() -> Config {
    Config {
        crawler: CrawlerConfig {
            max_pages: 10,
            max_depth: 1,
            crawl_delay: 0,
            max_retries: 0,
            timeout: 1000,
            concurrency: 1,
            retry_backoff: 10,
            allowed_domains: vec![],
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        index: IndexConfig {
            database_path: ":memory:".to_string(),
        },
        search: SearchConfig::default(),
    }
}

fn create_test_engine() -> SearchEngine {
    let index = Arc::new(SqliteIndex::open_in_memory().expect("in-memory index"));
    SearchEngine::new(create_test_config(), "test-hash".to_string(), index).unwrap()
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn document(url: &str, body: &str) -> NewDocument {
    let host = url::Url::parse(url).unwrap().host_str().unwrap().to_string();
    NewDocument {
        url: url.to_string(),
        host,
        title: format!("Title of {}", url),
        body: body.to_string(),
        content_type: "text/html".to_string(),
        depth: 0,
        crawled_at: base_time(),
        size_bytes: body.len() as u64,
        language: None,
        metadata: BTreeMap::new(),
    }
}

fn index_doc(engine: &SearchEngine, doc: NewDocument) {
    engine.index().upsert_document(&doc).expect("upsert");
}

fn urls(engine: &SearchEngine, query: &str, filters: &SearchFilters) -> Vec<String> {
    engine
        .search(query, 1, 50, filters)
        .unwrap()
        .results
        .into_iter()
        .map(|hit| hit.url)
        .collect()
}

#[test]
fn test_truth_score_breaks_equal_relevance() {
    let engine = create_test_engine();
    index_doc(
        &engine,
        document("https://a.example/water", "Water boils at 100 degrees Celsius"),
    );
    index_doc(
        &engine,
        document("https://b.example/water", "Water boils at 100 degrees Celsius"),
    );

    assert!(engine
        .update_truth_score("https://a.example/water", 0.1)
        .unwrap());
    assert!(engine
        .update_truth_score("https://b.example/water", 0.9)
        .unwrap());

    let page = engine
        .search("boils", 1, 10, &SearchFilters::default())
        .unwrap();
    assert_eq!(page.total_matches, 2);
    assert_eq!(page.ranking_version, RANKING_FORMULA_VERSION);
    assert_eq!(page.results[0].url, "https://b.example/water");
    assert_eq!(page.results[0].truth_score, 0.9);
    assert!(page.results[0].score > page.results[1].score);
    assert_eq!(page.results[0].relevance, page.results[1].relevance);
    assert!(page.results[1].score > 0.0);
    assert!(page.results[0].snippet.contains("boils"));
}

#[test]
fn test_unmatched_query_returns_no_results() {
    let engine = create_test_engine();
    index_doc(&engine, document("https://a.example/", "alpha beta gamma"));

    let page = engine
        .search("zeppelin", 1, 10, &SearchFilters::default())
        .unwrap();
    assert_eq!(page.total_matches, 0);
    assert_eq!(page.total_pages, 0);
    assert!(page.results.is_empty());

    // Only stopwords and short tokens: nothing to look up, still not an error
    let page = engine
        .search("the a", 1, 10, &SearchFilters::default())
        .unwrap();
    assert_eq!(page.total_matches, 0);
}

#[test]
fn test_query_terms_use_or_semantics() {
    let engine = create_test_engine();
    index_doc(&engine, document("https://a.example/1", "rivers and lakes"));
    index_doc(&engine, document("https://a.example/2", "mountains and valleys"));
    index_doc(&engine, document("https://a.example/3", "rivers between mountains"));

    let found = urls(&engine, "rivers mountains", &SearchFilters::default());
    assert_eq!(found.len(), 3);
    assert_eq!(found[0], "https://a.example/3", "matching both terms ranks first");
}

#[test]
fn test_rare_terms_weigh_more() {
    let engine = create_test_engine();
    index_doc(&engine, document("https://a.example/1", "common common"));
    index_doc(&engine, document("https://a.example/2", "common rare"));
    index_doc(&engine, document("https://a.example/3", "common"));

    let found = urls(&engine, "common rare", &SearchFilters::default());
    assert_eq!(found[0], "https://a.example/2");
}

#[test]
fn test_tokenizer_symmetry() {
    let engine = create_test_engine();
    let body = "Rust's borrow-checker (v1.75) rejects DATA races; naïve Ünïcode works.";
    index_doc(&engine, document("https://a.example/sym", body));

    for token in tokenizer::tokenize(body) {
        let page = engine
            .search(&token.term, 1, 10, &SearchFilters::default())
            .unwrap();
        assert_eq!(
            page.total_matches, 1,
            "indexed term '{}' should be searchable",
            token.term
        );
    }

    // Case and punctuation in the query are normalized the same way
    let page = engine
        .search("BORROW-Checker!", 1, 10, &SearchFilters::default())
        .unwrap();
    assert_eq!(page.total_matches, 1);
}

#[test]
fn test_pagination_is_deterministic() {
    let engine = create_test_engine();
    for i in 0..23 {
        let mut doc = document(&format!("https://a.example/doc/{:02}", i), "shared term here");
        // Three crawl times so ties are broken by timestamp, then by URL
        doc.crawled_at = base_time() + Duration::minutes(i % 3);
        index_doc(&engine, doc);
    }

    let filters = SearchFilters::default();
    let mut seen = Vec::new();
    for page_number in 1..=3 {
        let first = engine.search("shared", page_number, 10, &filters).unwrap();
        let second = engine.search("shared", page_number, 10, &filters).unwrap();
        let first_urls: Vec<_> = first.results.iter().map(|h| h.url.clone()).collect();
        let second_urls: Vec<_> = second.results.iter().map(|h| h.url.clone()).collect();

        assert_eq!(first_urls, second_urls);
        assert_eq!(first.total_matches, 23);
        assert_eq!(first.total_pages, 3);
        seen.extend(first_urls);
    }

    assert_eq!(seen.len(), 23);
    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 23, "pages never overlap");

    // Newest crawl first, then URL ascending
    assert_eq!(seen[0], "https://a.example/doc/02");
    assert_eq!(seen[1], "https://a.example/doc/05");

    let past_end = engine.search("shared", 4, 10, &filters).unwrap();
    assert!(past_end.results.is_empty());
    assert_eq!(past_end.total_matches, 23);
}

#[test]
fn test_recrawl_leaves_no_stale_postings() {
    let engine = create_test_engine();
    index_doc(&engine, document("https://a.example/page", "original vocabulary words"));
    index_doc(&engine, document("https://a.example/page", "replacement lexicon entirely"));

    let filters = SearchFilters::default();
    assert!(urls(&engine, "original", &filters).is_empty());
    assert!(urls(&engine, "vocabulary", &filters).is_empty());
    assert_eq!(urls(&engine, "lexicon", &filters), vec!["https://a.example/page"]);
    assert_eq!(engine.get_stats().unwrap().document_count, 1);
}

#[test]
fn test_truth_update_for_unknown_url() {
    let engine = create_test_engine();
    assert!(!engine
        .update_truth_score("https://nowhere.example/", 0.7)
        .unwrap());
    assert!(engine.document("https://nowhere.example/").unwrap().is_none());
    assert_eq!(engine.get_stats().unwrap().document_count, 0);
}

#[test]
fn test_truth_score_range_is_enforced() {
    let engine = create_test_engine();
    index_doc(&engine, document("https://a.example/", "content"));

    for bad in [-0.01, 1.01, f64::NAN] {
        let err = engine
            .update_truth_score("https://a.example/", bad)
            .unwrap_err();
        assert!(matches!(
            err,
            TrueglError::Validation(ValidationError::TruthScoreOutOfRange(_))
        ));
    }
    let doc = engine.document("https://a.example/").unwrap().unwrap();
    assert_eq!(doc.truth_score, 0.5);

    assert!(engine.update_truth_score("https://a.example/", 0.0).unwrap());
    assert!(engine.update_truth_score("https://a.example/", 1.0).unwrap());
}

#[test]
fn test_invalid_search_input() {
    let engine = create_test_engine();
    let filters = SearchFilters::default();

    let cases = [
        ("   ", 1, 10, ValidationError::EmptyQuery),
        ("term", 0, 10, ValidationError::InvalidPage(0)),
        ("term", 1, 0, ValidationError::InvalidPerPage { got: 0, max: 50 }),
        ("term", 1, 51, ValidationError::InvalidPerPage { got: 51, max: 50 }),
    ];
    for (query, page, per_page, expected) in cases {
        match engine.search(query, page, per_page, &filters) {
            Err(TrueglError::Validation(err)) => assert_eq!(err, expected),
            other => panic!("expected {:?}, got {:?}", expected, other.map(|p| p.total_matches)),
        }
    }

    let inverted = SearchFilters {
        crawled_after: Some(base_time()),
        crawled_before: Some(base_time() - Duration::days(1)),
        ..SearchFilters::default()
    };
    assert!(matches!(
        engine.search("term", 1, 10, &inverted),
        Err(TrueglError::Validation(ValidationError::InvalidDateRange))
    ));
}

#[test]
fn test_filters_narrow_candidates() {
    let engine = create_test_engine();

    let mut en = document("https://docs.example.org/en", "solar energy panels");
    en.language = Some("en-US".to_string());
    index_doc(&engine, en);

    let mut de = document("https://example.com/de", "solar energy speicher");
    de.language = Some("de".to_string());
    de.crawled_at = base_time() + Duration::days(10);
    index_doc(&engine, de);

    index_doc(&engine, document("https://other.net/x", "solar wind"));
    engine
        .update_truth_score("https://other.net/x", 0.2)
        .unwrap();

    let language = SearchFilters {
        language: Some("EN".to_string()),
        ..SearchFilters::default()
    };
    assert_eq!(urls(&engine, "solar", &language), vec!["https://docs.example.org/en"]);

    let domains = SearchFilters {
        domains: vec!["*.example.org".to_string(), "example.com".to_string()],
        ..SearchFilters::default()
    };
    let mut found = urls(&engine, "solar", &domains);
    found.sort();
    assert_eq!(found, vec!["https://docs.example.org/en", "https://example.com/de"]);

    let recent = SearchFilters {
        crawled_after: Some(base_time() + Duration::days(1)),
        ..SearchFilters::default()
    };
    assert_eq!(urls(&engine, "solar", &recent), vec!["https://example.com/de"]);

    let required = SearchFilters {
        required_terms: vec!["energy".to_string(), "panels".to_string()],
        ..SearchFilters::default()
    };
    assert_eq!(urls(&engine, "solar", &required), vec!["https://docs.example.org/en"]);

    let trusted = SearchFilters {
        min_truth_score: Some(0.5),
        ..SearchFilters::default()
    };
    assert_eq!(urls(&engine, "solar", &trusted).len(), 2);
}

#[test]
fn test_suggestions() {
    let engine = create_test_engine();
    index_doc(&engine, document("https://a.example/1", "photosynthesis photon"));
    index_doc(&engine, document("https://a.example/2", "photon photograph"));

    let suggestions = engine.suggest("PHO", 10).unwrap();
    let terms: Vec<_> = suggestions.iter().map(|s| s.term.as_str()).collect();
    assert_eq!(terms, vec!["photon", "photograph", "photosynthesis"]);
    assert_eq!(suggestions[0].document_frequency, 2);

    assert_eq!(engine.suggest("pho", 1).unwrap().len(), 1);
    assert!(matches!(
        engine.suggest("p", 10),
        Err(TrueglError::Validation(ValidationError::PrefixTooShort { .. }))
    ));
}

#[test]
fn test_stats_track_documents_and_terms() {
    let engine = create_test_engine();
    let empty = engine.get_stats().unwrap();
    assert_eq!(empty.document_count, 0);
    assert!(empty.last_crawl_time.is_none());

    index_doc(&engine, document("https://a.example/1", "one two three"));
    index_doc(&engine, document("https://a.example/2", "three four"));

    let stats = engine.get_stats().unwrap();
    assert_eq!(stats.document_count, 2);
    assert_eq!(stats.term_count, 4);
    assert_eq!(stats.posting_count, 5);
    assert_eq!(stats.last_crawl_time, Some(base_time()));
}
