//! Per-container extraction faults
//!
//! These never escape an extraction pass; they are counted and logged so a
//! malformed container cannot abort extraction of its siblings.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("URL resolution failed: {href} against {base} - {reason}")]
    UrlResolutionFailed {
        href: String,
        base: String,
        reason: String,
    },
}

impl ExtractionError {
    pub fn url_resolution_failed(href: &str, base: &str, reason: impl ToString) -> Self {
        Self::UrlResolutionFailed {
            href: href.to_string(),
            base: base.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;
