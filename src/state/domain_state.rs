use std::time::{Duration, Instant};

/// Politeness bookkeeping for one host during a crawl session
///
/// The crawler consults this before dispatching a fetch: consecutive fetch
/// starts to the same host are spaced by at least the configured crawl delay,
/// and a host that answered 429 with `Retry-After` is held back until that
/// deadline passes.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// When the most recent fetch to this host started
    pub last_request_time: Option<Instant>,

    /// Host-wide hold set by a rate-limit response
    pub backoff_until: Option<Instant>,
}

impl DomainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether a fetch may start now
    pub fn can_request(&self, crawl_delay: Duration, now: Instant) -> bool {
        self.time_until_next_request(crawl_delay, now).is_none()
    }

    /// Time left before the next fetch may start, or None if it may start now
    pub fn time_until_next_request(&self, crawl_delay: Duration, now: Instant) -> Option<Duration> {
        let mut ready_at = self.last_request_time.map(|last| last + crawl_delay);

        if let Some(hold) = self.backoff_until {
            ready_at = Some(ready_at.map_or(hold, |t| t.max(hold)));
        }

        ready_at
            .filter(|ready| *ready > now)
            .map(|ready| ready - now)
    }

    /// Records that a fetch to this host started at `now`
    pub fn record_request(&mut self, now: Instant) {
        self.last_request_time = Some(now);
    }

    /// Holds the host back until `until`; an earlier hold is never shortened
    pub fn defer_until(&mut self, until: Instant) {
        self.backoff_until = Some(self.backoff_until.map_or(until, |t| t.max(until)));
    }
}
