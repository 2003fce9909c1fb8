//! Generic resilient extraction engine
//!
//! Site-agnostic components composed by the orchestrator:
//! pattern library, cascade resolver, readiness detector, extraction pass,
//! deduplicator and pagination controller. Per-site adapters plug in through
//! the registry in `adapter`.

pub mod adapter;
pub mod cascade;
pub mod dedup;
pub mod error;
pub mod orchestrator;
pub mod page_pass;
pub mod pagination_controller;
pub mod patterns;
pub mod readiness;
pub mod text;

pub use adapter::{AdapterRegistry, GenericAdapter, ProfileAdapter, SiteAdapter, GENERIC_ADAPTER_ID};
pub use cascade::{resolve, resolve_all, CascadeMatch, DomScope};
pub use dedup::{merge, MergeOutcome, UniqueRecords};
pub use error::{ExtractionError, ExtractionResult};
pub use orchestrator::{EngineOptions, ExtractionOrchestrator, RunAccumulator, RunOptions, RunPlan, Step, Termination};
pub use page_pass::{extract_from_html, extract_page, PageExtraction};
pub use pagination_controller::{PaginationController, PaginationOptions};
pub use patterns::{OverrideMode, Pattern, PatternConfig, PatternOverrides, PatternSet, Role};
pub use readiness::{ReadinessDetector, ReadinessOptions, ReadinessSignal};
