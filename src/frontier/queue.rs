use super::policy::{CrawlPolicy, PolicyRejection};
use crate::url::extract_domain;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Instant;
use url::Url;

/// A URL waiting in the frontier
#[derive(Debug, Clone)]
pub struct QueuedUrl {
    /// Normalized URL
    pub url: Url,

    /// Lowercase host, the politeness key
    pub host: String,

    /// Discovery depth (seed is 0)
    pub depth: u32,

    /// Enqueue order, unique within the session
    pub seq: u64,

    /// Fetch attempts already made
    pub attempt: u32,

    /// Earliest instant a retry may be dispatched
    pub not_before: Option<Instant>,
}

impl QueuedUrl {
    pub fn is_due(&self, now: Instant) -> bool {
        self.not_before.map_or(true, |t| t <= now)
    }
}

// BinaryHeap is a max-heap; reverse so the shallowest, earliest entry pops first
impl Ord for QueuedUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .depth
            .cmp(&self.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth && self.seq == other.seq
    }
}

impl Eq for QueuedUrl {}

/// Pending URLs of one crawl session plus everything already seen
///
/// A normalized URL is admitted at most once per session. Rejected URLs are
/// remembered too, so rediscovering them is reported as a duplicate.
#[derive(Debug)]
pub struct Frontier {
    queue: BinaryHeap<QueuedUrl>,
    seen: HashSet<String>,
    next_seq: u64,
    policy: CrawlPolicy,
}

impl Frontier {
    pub fn new(policy: CrawlPolicy) -> Self {
        Self {
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
            next_seq: 0,
            policy,
        }
    }

    /// Admits `raw` at `depth` or explains why not
    pub fn admit(&mut self, raw: &str, depth: u32) -> Result<(), PolicyRejection> {
        let url = CrawlPolicy::normalize(raw)?;

        if !self.seen.insert(url.as_str().to_owned()) {
            return Err(PolicyRejection::AlreadySeen);
        }

        self.policy.evaluate(&url, depth)?;

        let host = extract_domain(&url)
            .ok_or_else(|| PolicyRejection::Malformed(format!("no host in {}", url)))?;
        let seq = self.bump_seq();
        self.queue.push(QueuedUrl {
            url,
            host,
            depth,
            seq,
            attempt: 0,
            not_before: None,
        });
        Ok(())
    }

    /// Whether `raw` would be admitted at `depth` right now
    pub fn should_visit(&self, raw: &str, depth: u32) -> bool {
        match self.policy.check(raw, depth) {
            Ok(url) => !self.seen.contains(url.as_str()),
            Err(_) => false,
        }
    }

    /// Marks a URL as seen without queueing it (e.g. a redirect target)
    pub fn mark_seen(&mut self, url: &Url) -> bool {
        self.seen.insert(url.as_str().to_owned())
    }

    /// Puts a retry back at its original depth, behind entries already queued
    pub fn requeue(&mut self, mut entry: QueuedUrl, not_before: Option<Instant>) {
        entry.seq = self.bump_seq();
        entry.not_before = not_before;
        self.queue.push(entry);
    }

    /// Pops the highest-priority entry accepted by `is_ready`
    ///
    /// Entries passed over are pushed back unchanged.
    pub fn pop_ready<F>(&mut self, mut is_ready: F) -> Option<QueuedUrl>
    where
        F: FnMut(&QueuedUrl) -> bool,
    {
        let mut not_ready = Vec::new();
        let mut found = None;

        while let Some(entry) = self.queue.pop() {
            if is_ready(&entry) {
                found = Some(entry);
                break;
            }
            not_ready.push(entry);
        }

        self.queue.extend(not_ready);
        found
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedUrl> {
        self.queue.iter()
    }

    /// Drops every pending entry and returns how many there were
    pub fn drain(&mut self) -> usize {
        let pending = self.queue.len();
        self.queue.clear();
        pending
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
