//! Scheduler for the crawl frontier and per-host politeness
//!
//! This module handles:
//! - Choosing the next URL whose host may be contacted now
//! - Per-host crawl-delay spacing and rate-limit holds
//! - Reserving page slots so concurrent workers never overshoot `max_pages`
//! - Session counters reported in the crawl summary
//!
//! The scheduler is plain synchronous state. Workers share it behind a mutex
//! and never hold that lock across an `.await`.

use crate::frontier::{Frontier, PolicyRejection, QueuedUrl};
use crate::state::DomainState;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use url::Url;

/// Longest an idle worker sleeps before re-checking the scheduler
pub const MAX_IDLE_WAIT: Duration = Duration::from_millis(100);

/// Running totals for one crawl session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlCounters {
    /// Responses whose body was read successfully
    pub fetched: u64,
    pub indexed: u64,
    /// Fetch failures after retries plus extraction failures
    pub failed: u64,
    /// Policy rejections plus entries left unfetched at the end
    pub skipped: u64,
    pub duplicates: u64,
    pub retries: u64,
}

/// What a worker should do next
#[derive(Debug)]
pub enum Next {
    /// Fetch this entry; a page slot has been reserved for it
    Fetch(QueuedUrl),
    /// Nothing is ready; the earliest entry becomes ready after this long
    Wait(Duration),
    /// Nothing can be dispatched until an in-flight fetch completes
    Idle,
    /// The session is over
    Done,
}

/// How an in-flight page ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Indexed,
    Failed,
    /// The session is halting; release the slot without counting it
    Aborted,
}

pub struct Scheduler {
    frontier: Frontier,
    hosts: HashMap<String, DomainState>,
    crawl_delay: Duration,
    max_pages: u64,
    in_flight: u64,
    counters: CrawlCounters,
}

impl Scheduler {
    pub fn new(frontier: Frontier, crawl_delay: Duration, max_pages: u32) -> Self {
        Self {
            frontier,
            hosts: HashMap::new(),
            crawl_delay,
            max_pages: u64::from(max_pages),
            in_flight: 0,
            counters: CrawlCounters::default(),
        }
    }

    /// Offers a discovered URL to the frontier and counts the outcome
    ///
    /// Returns whether the URL was queued.
    pub fn admit(&mut self, raw: &str, depth: u32) -> bool {
        match self.frontier.admit(raw, depth) {
            Ok(()) => true,
            Err(rejection) => {
                self.count_rejection(raw, &rejection);
                false
            }
        }
    }

    fn count_rejection(&mut self, raw: &str, rejection: &PolicyRejection) {
        if rejection.is_duplicate() {
            self.counters.duplicates += 1;
        } else {
            tracing::debug!("Skipping {}: {}", raw, rejection);
            self.counters.skipped += 1;
        }
    }

    /// Picks the next entry to fetch
    ///
    /// Entries are taken shallowest-first, skipping those whose retry delay
    /// has not elapsed or whose host was contacted less than `crawl_delay`
    /// ago. A returned [`Next::Fetch`] records the request against its host
    /// and holds a page slot until [`Scheduler::complete`] or
    /// [`Scheduler::retry`] is called.
    pub fn next(&mut self, now: Instant) -> Next {
        if self.counters.indexed >= self.max_pages {
            return Next::Done;
        }
        if self.frontier.is_empty() {
            return if self.in_flight == 0 {
                Next::Done
            } else {
                Next::Idle
            };
        }
        if self.counters.indexed + self.in_flight >= self.max_pages {
            return Next::Idle;
        }

        let delay = self.crawl_delay;
        let hosts = &self.hosts;
        let found = self.frontier.pop_ready(|entry| {
            entry.is_due(now)
                && hosts
                    .get(&entry.host)
                    .map_or(true, |state| state.can_request(delay, now))
        });

        match found {
            Some(entry) => {
                self.hosts
                    .entry(entry.host.clone())
                    .or_default()
                    .record_request(now);
                self.in_flight += 1;
                Next::Fetch(entry)
            }
            None => Next::Wait(self.minimum_wait(now)),
        }
    }

    /// Time until the first queued entry becomes dispatchable
    fn minimum_wait(&self, now: Instant) -> Duration {
        self.frontier
            .iter()
            .map(|entry| {
                let retry_wait = entry
                    .not_before
                    .map_or(Duration::ZERO, |t| t.saturating_duration_since(now));
                let host_wait = self
                    .hosts
                    .get(&entry.host)
                    .and_then(|state| state.time_until_next_request(self.crawl_delay, now))
                    .unwrap_or(Duration::ZERO);
                retry_wait.max(host_wait)
            })
            .min()
            .unwrap_or(MAX_IDLE_WAIT)
            .max(Duration::from_millis(1))
    }

    /// Puts a failed fetch back for another attempt after `delay`
    ///
    /// A rate-limited response also holds back every other URL of that host.
    pub fn retry(&mut self, mut entry: QueuedUrl, delay: Duration, now: Instant, rate_limited: bool) {
        self.release();
        self.counters.retries += 1;

        let ready_at = now + delay;
        if rate_limited {
            self.hosts
                .entry(entry.host.clone())
                .or_default()
                .defer_until(ready_at);
        }

        entry.attempt += 1;
        self.frontier.requeue(entry, Some(ready_at));
    }

    pub fn record_fetched(&mut self) {
        self.counters.fetched += 1;
    }

    /// Remembers a redirect target so it is not fetched again
    pub fn mark_seen(&mut self, url: &Url) {
        self.frontier.mark_seen(url);
    }

    /// Releases the page slot of a finished entry
    pub fn complete(&mut self, outcome: PageOutcome) {
        self.release();
        match outcome {
            PageOutcome::Indexed => self.counters.indexed += 1,
            PageOutcome::Failed => self.counters.failed += 1,
            PageOutcome::Aborted => {}
        }
    }

    fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn counters(&self) -> CrawlCounters {
        self.counters
    }

    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight
    }

    /// Ends the session: whatever is still queued counts as skipped
    pub fn finish(&mut self) -> CrawlCounters {
        self.counters.skipped += self.frontier.drain() as u64;
        self.counters
    }
}
