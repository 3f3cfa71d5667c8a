//! Crawl session state
//!
//! - `DomainState`: per-host politeness spacing and rate-limit holds
//! - `PageState`: the terminal outcome recorded for each finished page

mod domain_state;
mod page_state;

pub use domain_state::DomainState;
pub use page_state::PageState;
