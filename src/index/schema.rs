//! Database schema for the inverted index

/// Bumped whenever a table definition changes
pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_SQL: &str = r#"
-- One row per crawled URL
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    host TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    content_type TEXT NOT NULL,
    depth INTEGER NOT NULL,
    crawled_at TEXT NOT NULL,
    truth_score REAL NOT NULL DEFAULT 0.5,
    size_bytes INTEGER NOT NULL,
    language TEXT,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_documents_host ON documents(host);
CREATE INDEX IF NOT EXISTS idx_documents_crawled_at ON documents(crawled_at);

-- term -> document, regenerated whenever a document body changes
CREATE TABLE IF NOT EXISTS postings (
    term TEXT NOT NULL,
    document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    frequency INTEGER NOT NULL CHECK (frequency > 0),
    positions TEXT NOT NULL,
    PRIMARY KEY (term, document_id)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_postings_document ON postings(document_id);

-- Crawl sessions
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seed_url TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    pages_fetched INTEGER NOT NULL DEFAULT 0,
    pages_indexed INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    pages_skipped INTEGER NOT NULL DEFAULT 0
);

-- Terminal outcome of every page a session finished with
CREATE TABLE IF NOT EXISTS crawl_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES crawl_runs(id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    outcome TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    error_message TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_log_run ON crawl_log(run_id);
"#;

pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
