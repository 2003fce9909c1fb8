//! Job listing records and their run-level identity
//!
//! A `RawRecord` is what one extraction pass pulls out of a single container.
//! The orchestrator stamps it with the company and discovery time to obtain a
//! `JobRecord`. Two records are the same listing when their `DedupKey`s match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One candidate listing discovered on a page, before run metadata is attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Trimmed, whitespace-collapsed title text
    pub title: String,

    /// Location text, empty when the container carries none
    pub location: String,

    /// Absolute URL of the listing detail page
    pub url: Option<String>,

    /// Identifier taken from a DOM attribute or the listing URL
    pub external_id: Option<String>,
}

impl RawRecord {
    /// Emission rule: non-empty title and at least one of url / location
    pub fn is_emittable(&self) -> bool {
        let has_url = self.url.as_deref().is_some_and(|u| !u.trim().is_empty());
        !self.title.trim().is_empty() && (has_url || !self.location.trim().is_empty())
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.title, self.url.as_deref())
    }

    /// Attach run metadata
    pub fn into_job(self, stamp: &RecordStamp) -> JobRecord {
        JobRecord {
            title: self.title,
            location: self.location,
            url: self.url,
            external_id: self.external_id,
            company: stamp.company.clone(),
            discovered_at: stamp.discovered_at,
        }
    }
}

/// Company + time applied to every record merged from one page
#[derive(Debug, Clone)]
pub struct RecordStamp {
    pub company: String,
    pub discovered_at: DateTime<Utc>,
}

impl RecordStamp {
    pub fn new(company: impl Into<String>, discovered_at: DateTime<Utc>) -> Self {
        Self {
            company: company.into(),
            discovered_at,
        }
    }

    pub fn now(company: impl Into<String>) -> Self {
        Self::new(company, Utc::now())
    }
}

/// A unique job listing within one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub location: String,
    pub url: Option<String>,
    pub external_id: Option<String>,
    pub company: String,
    pub discovered_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.title, self.url.as_deref())
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.dedup_key().fingerprint()
    }

    /// URL as written to exports (empty when the listing had no link)
    pub fn url_or_empty(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

/// Normalized (title, url) pair identifying a listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    title: String,
    url: String,
}

impl DedupKey {
    /// Title compares case- and whitespace-insensitively, url compares exactly
    pub fn new(title: &str, url: Option<&str>) -> Self {
        Self {
            title: normalize_title(title),
            url: url.unwrap_or_default().to_string(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.title.as_bytes());
        // unit separator keeps ("ab", "c") and ("a", "bc") apart
        hasher.update(&[0x1f]);
        hasher.update(self.url.as_bytes());
        Fingerprint(hasher.finalize())
    }
}

/// Compact hash of a `DedupKey`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(blake3::Hash);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Lowercase and collapse whitespace runs
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
