//! Domain module - job records, pagination state and run results
//!
//! Plain data shared by the extraction engine, the infrastructure
//! collaborators and the application layer. Nothing here performs I/O.

pub mod job_record;
pub mod pagination;
pub mod run_result;
pub mod site;

pub use job_record::{normalize_title, DedupKey, Fingerprint, JobRecord, RawRecord, RecordStamp};
pub use pagination::{NavigationStrategy, PaginationPhase, PaginationState};
pub use run_result::{RunResult, RunStatus};
pub use site::SiteTarget;
