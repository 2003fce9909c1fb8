//! Order-preserving deduplication across extraction passes
//!
//! `merge` is a pure fold: the existing set is consumed and returned with the
//! unseen incoming records appended in their original order.

use std::collections::HashSet;

use crate::domain::{Fingerprint, JobRecord, RawRecord, RecordStamp};

/// Unique records of one run, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct UniqueRecords {
    records: Vec<JobRecord>,
    seen: HashSet<Fingerprint>,
}

impl UniqueRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn as_slice(&self) -> &[JobRecord] {
        &self.records
    }

    pub fn contains(&self, record: &RawRecord) -> bool {
        self.seen.contains(&record.dedup_key().fingerprint())
    }

    pub fn into_records(self) -> Vec<JobRecord> {
        self.records
    }

    fn insert(&mut self, record: JobRecord) -> bool {
        if self.seen.insert(record.fingerprint()) {
            self.records.push(record);
            true
        } else {
            false
        }
    }
}

impl FromIterator<JobRecord> for UniqueRecords {
    fn from_iter<I: IntoIterator<Item = JobRecord>>(iter: I) -> Self {
        let mut unique = Self::new();
        for record in iter {
            unique.insert(record);
        }
        unique
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub records: UniqueRecords,
    pub added: usize,
    pub duplicates: usize,
}

/// Fold `incoming` into `existing`; the first occurrence of a key wins
pub fn merge(existing: UniqueRecords, incoming: Vec<RawRecord>, stamp: &RecordStamp) -> MergeOutcome {
    let mut records = existing;
    let mut added = 0;
    let mut duplicates = 0;

    for raw in incoming {
        if records.insert(raw.into_job(stamp)) {
            added += 1;
        } else {
            duplicates += 1;
        }
    }

    MergeOutcome {
        records,
        added,
        duplicates,
    }
}
