//! Crawler coordinator - crawl session orchestration
//!
//! The coordinator owns one crawl session:
//! - Recording the session as a crawl run
//! - Seeding the frontier
//! - Running `concurrency` worker tasks that fetch, extract and index
//! - Retrying transient failures and logging every finished page
//! - Honouring the stop signal and halting on storage errors

use super::fetcher::{fetch_page, FetchError, FetchedPage};
use super::scheduler::{Next, PageOutcome, Scheduler, MAX_IDLE_WAIT};
use super::{CrawlSummary, StopSignal};
use crate::config::CrawlerConfig;
use crate::extract::{extract_document, recover_links};
use crate::frontier::{CrawlPolicy, Frontier, QueuedUrl};
use crate::index::{IndexStore, NewDocument, PageLogEntry, RunStatus, RunTotals, StorageError};
use crate::state::PageState;
use crate::url::{extract_domain, normalize_url};
use crate::{Result, TrueglError};
use chrono::Utc;
use reqwest::Client;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use url::Url;

/// Pages between progress log lines
const PROGRESS_INTERVAL: u64 = 10;

/// State shared by all workers of one session
struct Shared {
    scheduler: Mutex<Scheduler>,
    /// Signalled whenever a worker finishes with an entry
    notify: Notify,
    stop: StopSignal,
    index: Arc<dyn IndexStore>,
    client: Client,
    config: CrawlerConfig,
    run_id: i64,
    /// First storage error; set once, halts every worker
    fatal: Mutex<Option<StorageError>>,
}

impl Shared {
    fn scheduler(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn halted(&self) -> bool {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn halt(&self, err: StorageError) {
        tracing::error!("Storage error, halting crawl run {}: {}", self.run_id, err);
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        if fatal.is_none() {
            *fatal = Some(err);
        }
        drop(fatal);
        self.notify.notify_waiters();
    }

    fn take_fatal(&self) -> Option<StorageError> {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn log_page(
        &self,
        entry: &QueuedUrl,
        outcome: PageState,
        error_message: Option<String>,
    ) -> std::result::Result<(), StorageError> {
        self.index.record_page(&PageLogEntry {
            run_id: self.run_id,
            url: entry.url.to_string(),
            depth: entry.depth,
            outcome,
            attempts: entry.attempt + 1,
            error_message,
        })
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    shared: Arc<Shared>,
    seed_url: Url,
    started_at: chrono::DateTime<Utc>,
}

impl Coordinator {
    /// Records a new crawl run and prepares an empty frontier
    pub fn new(
        seed_url: Url,
        config: CrawlerConfig,
        index: Arc<dyn IndexStore>,
        client: Client,
        config_hash: &str,
        stop: StopSignal,
    ) -> Result<Self> {
        let run_id = index.begin_run(seed_url.as_str(), config_hash)?;
        let frontier = Frontier::new(CrawlPolicy::from_config(&config));
        let scheduler = Scheduler::new(frontier, config.crawl_delay(), config.max_pages);

        Ok(Self {
            shared: Arc::new(Shared {
                scheduler: Mutex::new(scheduler),
                notify: Notify::new(),
                stop,
                index,
                client,
                config,
                run_id,
                fatal: Mutex::new(None),
            }),
            seed_url,
            started_at: Utc::now(),
        })
    }

    pub fn run_id(&self) -> i64 {
        self.shared.run_id
    }

    /// Runs the session to completion, cancellation or storage failure
    pub async fn run(self) -> Result<CrawlSummary> {
        let shared = &self.shared;
        let start_time = Instant::now();
        tracing::info!(
            "Starting crawl run {} from {} (max {} pages, depth {})",
            shared.run_id,
            self.seed_url,
            shared.config.max_pages,
            shared.config.max_depth
        );

        if !shared.scheduler().admit(self.seed_url.as_str(), 0) {
            tracing::info!("Seed {} rejected by crawl policy", self.seed_url);
        }

        let mut workers = JoinSet::new();
        for worker_id in 0..shared.config.concurrency.max(1) {
            workers.spawn(worker(Arc::clone(shared), worker_id));
        }

        let mut worker_failure = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Crawl worker failed: {}", e);
                worker_failure.get_or_insert_with(|| e.to_string());
                // Leave nobody waiting on a reservation the failed worker held
                shared.stop.stop();
            }
        }

        let counters = shared.scheduler().finish();
        let cancelled = shared.stop.is_stopped() && worker_failure.is_none();
        let totals = RunTotals {
            pages_fetched: counters.fetched,
            pages_indexed: counters.indexed,
            pages_failed: counters.failed,
            pages_skipped: counters.skipped,
        };

        if let Some(err) = shared.take_fatal() {
            self.close_run(RunStatus::Failed, &totals);
            return Err(TrueglError::Storage(err));
        }
        if let Some(message) = worker_failure {
            self.close_run(RunStatus::Failed, &totals);
            return Err(TrueglError::Worker(message));
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        shared.index.finish_run(shared.run_id, status, &totals)?;

        let summary = CrawlSummary {
            run_id: shared.run_id,
            seed_url: self.seed_url.to_string(),
            pages_fetched: counters.fetched,
            pages_indexed: counters.indexed,
            pages_failed: counters.failed,
            pages_skipped: counters.skipped,
            duplicates_ignored: counters.duplicates,
            retries: counters.retries,
            cancelled,
            started_at: self.started_at,
            elapsed: start_time.elapsed(),
        };

        tracing::info!(
            "Crawl run {} {}: {} indexed, {} failed, {} skipped in {:?}",
            summary.run_id,
            status.to_db_string(),
            summary.pages_indexed,
            summary.pages_failed,
            summary.pages_skipped,
            summary.elapsed
        );

        Ok(summary)
    }

    /// Best-effort run close on the failure paths
    fn close_run(&self, status: RunStatus, totals: &RunTotals) {
        if let Err(e) = self.shared.index.finish_run(self.shared.run_id, status, totals) {
            tracing::error!("Failed to close crawl run {}: {}", self.shared.run_id, e);
        }
    }
}

async fn worker(shared: Arc<Shared>, worker_id: u32) {
    let mut stop_rx = shared.stop.subscribe();

    loop {
        if shared.stop.is_stopped() || shared.halted() {
            break;
        }

        // Register interest before inspecting the scheduler so a completion
        // between the check and the wait is not missed
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let next = shared.scheduler().next(Instant::now());
        let wait = match next {
            Next::Fetch(entry) => {
                if let Err(e) = process(&shared, entry).await {
                    shared.halt(e);
                }
                shared.notify.notify_waiters();
                continue;
            }
            Next::Done => {
                tracing::debug!("Worker {} finished", worker_id);
                shared.notify.notify_waiters();
                break;
            }
            Next::Wait(wait) => wait.min(MAX_IDLE_WAIT),
            Next::Idle => MAX_IDLE_WAIT,
        };

        tokio::select! {
            _ = &mut notified => {}
            _ = tokio::time::sleep(wait) => {}
            _ = stop_rx.changed() => {}
        }
    }
}

/// Fetches one entry and settles its reservation
async fn process(shared: &Shared, entry: QueuedUrl) -> std::result::Result<(), StorageError> {
    tracing::debug!(
        "Fetching {} (depth {}, attempt {})",
        entry.url,
        entry.depth,
        entry.attempt + 1
    );

    match fetch_page(&shared.client, &entry.url, shared.config.timeout()).await {
        Ok(page) => handle_page(shared, entry, page),
        Err(err) if err.is_transient() && entry.attempt < shared.config.max_retries => {
            let delay = err
                .retry_after()
                .unwrap_or_else(|| shared.config.retry_delay(entry.attempt + 1));
            tracing::warn!(
                "Fetch of {} failed ({}), retrying in {:?}",
                entry.url,
                err,
                delay
            );
            let rate_limited = err.is_rate_limited();
            shared
                .scheduler()
                .retry(entry, delay, Instant::now(), rate_limited);
            Ok(())
        }
        Err(err) => {
            tracing::warn!("Giving up on {}: {}", entry.url, err);
            settle(shared, PageOutcome::Failed);
            shared.log_page(&entry, PageState::FetchFailed, Some(describe(&err)))
        }
    }
}

fn handle_page(
    shared: &Shared,
    entry: QueuedUrl,
    page: FetchedPage,
) -> std::result::Result<(), StorageError> {
    {
        let mut scheduler = shared.scheduler();
        scheduler.record_fetched();
        if page.final_url != entry.url {
            if let Ok(target) = normalize_url(page.final_url.as_str()) {
                scheduler.mark_seen(&target);
            }
        }
    }

    let (links, outcome) = match extract_document(
        &page.body,
        page.content_type.as_deref(),
        &page.final_url,
        &entry.url,
    ) {
        Ok(extracted) => {
            let host = extract_domain(&entry.url).unwrap_or_else(|| entry.host.clone());
            let document = NewDocument {
                url: entry.url.to_string(),
                host,
                language: extracted.language().map(str::to_string),
                title: extracted.title,
                body: extracted.body_text,
                content_type: extracted.content_type,
                depth: entry.depth,
                crawled_at: Utc::now(),
                size_bytes: page.body.len() as u64,
                metadata: extracted.metadata,
            };

            if let Err(e) = shared.index.upsert_document(&document) {
                settle(shared, PageOutcome::Aborted);
                return Err(e);
            }
            tracing::debug!("Indexed {} ({} links)", entry.url, extracted.outbound_links.len());
            settle(shared, PageOutcome::Indexed);
            shared.log_page(&entry, PageState::Indexed, None)?;
            (extracted.outbound_links, PageOutcome::Indexed)
        }
        Err(err) => {
            tracing::warn!("Extraction failed for {}: {}", entry.url, err);
            settle(shared, PageOutcome::Failed);
            shared.log_page(&entry, PageState::ExtractionFailed, Some(err.to_string()))?;
            (recover_links(&page.body, &page.final_url), PageOutcome::Failed)
        }
    };

    let mut scheduler = shared.scheduler();
    let queued = links
        .iter()
        .filter(|link| scheduler.admit(link, entry.depth + 1))
        .count();
    tracing::debug!(
        "{} of {} links from {} queued ({:?})",
        queued,
        links.len(),
        entry.url,
        outcome
    );
    Ok(())
}

/// Releases the entry's slot and emits progress every few pages
fn settle(shared: &Shared, outcome: PageOutcome) {
    let mut scheduler = shared.scheduler();
    scheduler.complete(outcome);

    let counters = scheduler.counters();
    let finished = counters.indexed + counters.failed;
    if outcome != PageOutcome::Aborted && finished > 0 && finished % PROGRESS_INTERVAL == 0 {
        tracing::info!(
            "Progress: {} indexed, {} failed, {} in frontier, {} in flight",
            counters.indexed,
            counters.failed,
            scheduler.frontier_size(),
            scheduler.in_flight()
        );
    }
}

fn describe(err: &FetchError) -> String {
    match err.status() {
        Some(status) => format!("HTTP {}", status),
        None => err.to_string(),
    }
}
