//! Resolved description of the listing a run traverses

use serde::{Deserialize, Serialize};

/// Everything the engine needs to know about one site, after configuration
/// has been validated and the start URL assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTarget {
    /// Company name stamped on every record
    pub company: String,

    /// Absolute start URL, query parameters included
    pub start_url: String,

    /// Upper bound on listing pages visited (at least 1)
    pub max_pages: u32,
}

impl SiteTarget {
    pub fn new(company: impl Into<String>, start_url: impl Into<String>, max_pages: u32) -> Self {
        Self {
            company: company.into(),
            start_url: start_url.into(),
            max_pages: max_pages.max(1),
        }
    }
}
