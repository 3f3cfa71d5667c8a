//! Terminal outcomes of a page in a crawl session
//!
//! Every page the crawler finishes with ends up in exactly one of these states,
//! which is what the crawl log persists.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    /// Fetched, extracted and written to the index
    Indexed,

    /// Fetch failed permanently or after exhausting retries
    FetchFailed,

    /// Fetched but the content could not be extracted
    ExtractionFailed,
}

impl PageState {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Indexed => "indexed",
            Self::FetchFailed => "fetch_failed",
            Self::ExtractionFailed => "extraction_failed",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
