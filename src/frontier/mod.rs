//! URL frontier and crawl policy
//!
//! [`CrawlPolicy`] decides whether a URL may be crawled at a given depth.
//! [`Frontier`] adds session memory on top: it orders pending URLs
//! shallowest-first and refuses anything already queued, fetched or rejected.

mod policy;
mod queue;

pub use policy::{CrawlPolicy, PolicyRejection};
pub use queue::{Frontier, QueuedUrl};
