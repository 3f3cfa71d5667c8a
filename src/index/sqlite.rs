//! SQLite implementation of [`IndexStore`]

use super::schema::initialize_schema;
use super::tokenizer::term_frequencies;
use super::traits::{IndexStore, StorageError, StorageResult};
use super::{
    DocumentId, DocumentRecord, IndexStats, NewDocument, PageLogEntry, PostingHit,
    RankingSignals, RunRecord, RunStatus, RunTotals, TermSuggestion,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Stay well under SQLite's bound-parameter limit
const IN_CLAUSE_CHUNK: usize = 500;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DOCUMENT_COLUMNS: &str = "id, url, host, title, body, content_type, depth, crawled_at,
     truth_score, size_bytes, language, metadata";

const RUN_COLUMNS: &str = "id, seed_url, config_hash, started_at, finished_at, status,
     pages_fetched, pages_indexed, pages_failed, pages_skipped";

/// SQLite-backed inverted index
///
/// All writes go through a single writer connection. File databases run in WAL
/// mode with a second, read-only connection so queries never wait on a crawl's
/// upserts and only ever see committed transactions. In-memory databases use
/// the writer connection for reads as well.
pub struct SqliteIndex {
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
}

impl SqliteIndex {
    /// Opens or creates the index database at `path`; `:memory:` opens a private in-memory index
    pub fn open(path: &Path) -> StorageResult<Self> {
        if path == Path::new(":memory:") {
            return Self::open_in_memory();
        }

        let writer = Connection::open(path)?;
        writer.busy_timeout(BUSY_TIMEOUT)?;
        writer.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&writer)?;

        let reader = Connection::open(path)?;
        reader.busy_timeout(BUSY_TIMEOUT)?;
        reader.execute_batch("PRAGMA query_only = ON;")?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
        })
    }

    /// Creates a private in-memory index
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            writer: Mutex::new(conn),
            reader: None,
        })
    }

    fn writer(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.writer.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn reader(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.reader
            .as_ref()
            .unwrap_or(&self.writer)
            .lock()
            .map_err(|_| StorageError::LockPoisoned)
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &'static str, value: String) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp { column, value })
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

/// Column values as SQLite hands them back, before timestamp/JSON decoding
struct RawDocument {
    id: i64,
    url: String,
    host: String,
    title: String,
    body: String,
    content_type: String,
    depth: i64,
    crawled_at: String,
    truth_score: f64,
    size_bytes: i64,
    language: Option<String>,
    metadata: String,
}

impl RawDocument {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            host: row.get(2)?,
            title: row.get(3)?,
            body: row.get(4)?,
            content_type: row.get(5)?,
            depth: row.get(6)?,
            crawled_at: row.get(7)?,
            truth_score: row.get(8)?,
            size_bytes: row.get(9)?,
            language: row.get(10)?,
            metadata: row.get(11)?,
        })
    }

    fn into_record(self) -> StorageResult<DocumentRecord> {
        let metadata: BTreeMap<String, String> = serde_json::from_str(&self.metadata)?;
        Ok(DocumentRecord {
            id: self.id,
            url: self.url,
            host: self.host,
            title: self.title,
            body: self.body,
            content_type: self.content_type,
            depth: to_u32(self.depth),
            crawled_at: parse_timestamp("crawled_at", self.crawled_at)?,
            truth_score: self.truth_score,
            size_bytes: to_u64(self.size_bytes),
            language: self.language,
            metadata,
        })
    }
}

struct RawRun {
    id: i64,
    seed_url: String,
    config_hash: String,
    started_at: String,
    finished_at: Option<String>,
    status: String,
    counters: [i64; 4],
}

impl RawRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            seed_url: row.get(1)?,
            config_hash: row.get(2)?,
            started_at: row.get(3)?,
            finished_at: row.get(4)?,
            status: row.get(5)?,
            counters: [row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?],
        })
    }

    fn into_record(self) -> StorageResult<RunRecord> {
        let [fetched, indexed, failed, skipped] = self.counters;
        Ok(RunRecord {
            id: self.id,
            seed_url: self.seed_url,
            config_hash: self.config_hash,
            started_at: parse_timestamp("started_at", self.started_at)?,
            finished_at: self
                .finished_at
                .map(|ts| parse_timestamp("finished_at", ts))
                .transpose()?,
            status: RunStatus::from_db_string(&self.status).unwrap_or(RunStatus::Failed),
            pages_fetched: to_u64(fetched),
            pages_indexed: to_u64(indexed),
            pages_failed: to_u64(failed),
            pages_skipped: to_u64(skipped),
        })
    }
}

impl IndexStore for SqliteIndex {
    // ===== Documents =====

    fn upsert_document(&self, doc: &NewDocument) -> StorageResult<DocumentId> {
        let metadata = serde_json::to_string(&doc.metadata)?;
        let postings = term_frequencies(&doc.body);

        let mut conn = self.writer()?;
        let tx = conn.transaction()?;

        let id: DocumentId = tx.query_row(
            "INSERT INTO documents
                (url, host, title, body, content_type, depth, crawled_at, size_bytes, language, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(url) DO UPDATE SET
                host = excluded.host,
                title = excluded.title,
                body = excluded.body,
                content_type = excluded.content_type,
                depth = excluded.depth,
                crawled_at = excluded.crawled_at,
                size_bytes = excluded.size_bytes,
                language = excluded.language,
                metadata = excluded.metadata
             RETURNING id",
            params![
                doc.url,
                doc.host,
                doc.title,
                doc.body,
                doc.content_type,
                doc.depth,
                format_timestamp(&doc.crawled_at),
                i64::try_from(doc.size_bytes).unwrap_or(i64::MAX),
                doc.language,
                metadata,
            ],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM postings WHERE document_id = ?1", params![id])?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO postings (term, document_id, frequency, positions) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (term, stats) in &postings {
                let positions = serde_json::to_string(&stats.positions)?;
                insert.execute(params![term, id, stats.frequency, positions])?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    fn update_truth_score(&self, url: &str, score: f64) -> StorageResult<bool> {
        let conn = self.writer()?;
        let changed = conn.execute(
            "UPDATE documents SET truth_score = ?1 WHERE url = ?2",
            params![score, url],
        )?;
        Ok(changed > 0)
    }

    fn get_document(&self, id: DocumentId) -> StorageResult<DocumentRecord> {
        let raw = {
            let conn = self.reader()?;
            conn.query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id],
                RawDocument::from_row,
            )
            .optional()?
        };

        raw.ok_or_else(|| StorageError::DocumentNotFound(format!("Document ID {}", id)))?
            .into_record()
    }

    fn get_document_by_url(&self, url: &str) -> StorageResult<Option<DocumentRecord>> {
        let raw = {
            let conn = self.reader()?;
            conn.query_row(
                &format!("SELECT {} FROM documents WHERE url = ?1", DOCUMENT_COLUMNS),
                params![url],
                RawDocument::from_row,
            )
            .optional()?
        };

        raw.map(RawDocument::into_record).transpose()
    }

    fn document_count(&self) -> StorageResult<u64> {
        let conn = self.reader()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(to_u64(count))
    }

    // ===== Postings =====

    fn lookup_postings(&self, term: &str) -> StorageResult<Vec<PostingHit>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT document_id, frequency FROM postings WHERE term = ?1 ORDER BY document_id",
        )?;

        let hits = stmt
            .query_map(params![term], |row| {
                Ok(PostingHit {
                    document_id: row.get(0)?,
                    frequency: to_u32(row.get(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hits)
    }

    fn term_positions(&self, term: &str, id: DocumentId) -> StorageResult<Vec<u32>> {
        let raw: Option<String> = {
            let conn = self.reader()?;
            conn.query_row(
                "SELECT positions FROM postings WHERE term = ?1 AND document_id = ?2",
                params![term, id],
                |row| row.get(0),
            )
            .optional()?
        };

        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn ranking_signals(&self, ids: &[DocumentId]) -> StorageResult<Vec<RankingSignals>> {
        let conn = self.reader()?;
        let mut signals = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(IN_CLAUSE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT id, url, host, crawled_at, truth_score, language
                 FROM documents WHERE id IN ({})",
                placeholders
            ))?;

            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            for (document_id, url, host, crawled_at, truth_score, language) in rows {
                signals.push(RankingSignals {
                    document_id,
                    url,
                    host,
                    crawled_at: parse_timestamp("crawled_at", crawled_at)?,
                    truth_score,
                    language,
                });
            }
        }

        Ok(signals)
    }

    fn suggest_terms(&self, prefix: &str, limit: usize) -> StorageResult<Vec<TermSuggestion>> {
        let upper = format!("{}\u{10FFFF}", prefix);
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT term, COUNT(*) AS df FROM postings
             WHERE term >= ?1 AND term < ?2
             GROUP BY term
             ORDER BY df DESC, term ASC
             LIMIT ?3",
        )?;

        let suggestions = stmt
            .query_map(
                params![prefix, upper, i64::try_from(limit).unwrap_or(i64::MAX)],
                |row| {
                    Ok(TermSuggestion {
                        term: row.get(0)?,
                        document_frequency: to_u64(row.get(1)?),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(suggestions)
    }

    fn stats(&self) -> StorageResult<IndexStats> {
        let conn = self.reader()?;

        let (document_count, last_crawl): (i64, Option<String>) = conn.query_row(
            "SELECT COUNT(*), MAX(crawled_at) FROM documents",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let (term_count, posting_count): (i64, i64) = conn.query_row(
            "SELECT COUNT(DISTINCT term), COUNT(*) FROM postings",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let run_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM crawl_runs", [], |row| row.get(0))?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok(IndexStats {
            document_count: to_u64(document_count),
            last_crawl_time: last_crawl
                .map(|ts| parse_timestamp("crawled_at", ts))
                .transpose()?,
            storage_size_bytes: to_u64(page_count.saturating_mul(page_size)),
            term_count: to_u64(term_count),
            posting_count: to_u64(posting_count),
            run_count: to_u64(run_count),
        })
    }

    // ===== Crawl runs =====

    fn begin_run(&self, seed_url: &str, config_hash: &str) -> StorageResult<i64> {
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO crawl_runs (seed_url, config_hash, started_at, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                seed_url,
                config_hash,
                format_timestamp(&Utc::now()),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(&self, run_id: i64, status: RunStatus, totals: &RunTotals) -> StorageResult<()> {
        let conn = self.writer()?;
        conn.execute(
            "UPDATE crawl_runs SET finished_at = ?1, status = ?2,
                pages_fetched = ?3, pages_indexed = ?4, pages_failed = ?5, pages_skipped = ?6
             WHERE id = ?7",
            params![
                format_timestamp(&Utc::now()),
                status.to_db_string(),
                totals.pages_fetched,
                totals.pages_indexed,
                totals.pages_failed,
                totals.pages_skipped,
                run_id
            ],
        )?;
        Ok(())
    }

    fn record_page(&self, entry: &PageLogEntry) -> StorageResult<()> {
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO crawl_log (run_id, url, depth, outcome, attempts, error_message, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.run_id,
                entry.url,
                entry.depth,
                entry.outcome.to_db_string(),
                entry.attempts,
                entry.error_message,
                format_timestamp(&Utc::now())
            ],
        )?;
        Ok(())
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let raw = {
            let conn = self.reader()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM crawl_runs ORDER BY id DESC LIMIT ?1",
                RUN_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![i64::try_from(limit).unwrap_or(i64::MAX)],
                    RawRun::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        raw.into_iter().map(RawRun::into_record).collect()
    }
}
