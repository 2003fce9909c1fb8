//! Career Harvest - resilient job-listing extraction
//!
//! Walks paginated career pages of heterogeneous sites and turns their job
//! cards into deduplicated `JobRecord`s, surviving markup differences and
//! transient failures through selector cascades and bounded retries.

pub mod application;
pub mod domain;
pub mod extraction;
pub mod infrastructure;

/// Scripted in-memory pages for the crate's own tests and benches
#[doc(hidden)]
pub mod test_utils;

pub use application::{HarvestService, HarvestSummary};
pub use domain::{JobRecord, RunResult, RunStatus, SiteTarget};
pub use extraction::{AdapterRegistry, EngineOptions, ExtractionOrchestrator, SiteAdapter};
pub use infrastructure::{AppConfig, BrowserPage, SessionError, SessionFactory};
