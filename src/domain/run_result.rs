//! Outcome of one site run

use super::job_record::JobRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Listing traversed until `max_pages` or its natural end
    Completed,
    /// Pagination broke down; accumulated records are still returned
    Partial,
    /// Session-level failure; records gathered before it are kept
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Completed => "COMPLETED",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub company: String,
    /// Unique records in first-seen order
    pub records: Vec<JobRecord>,
    pub pages_processed: u32,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Human readable cause for `Partial` / `Failed`
    pub error: Option<String>,
    /// Name of the diagnostic artifact captured on failure
    pub diagnostic: Option<String>,
}

impl RunResult {
    /// Result for a run that never got a session
    pub fn failed_before_start(
        run_id: Uuid,
        company: impl Into<String>,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            company: company.into(),
            records: Vec::new(),
            pages_processed: 0,
            status: RunStatus::Failed,
            started_at,
            finished_at: Utc::now(),
            error: Some(error.into()),
            diagnostic: None,
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }
}
