//! Application layer
//!
//! Use cases that compose the extraction engine with the infrastructure
//! collaborators.

pub mod harvest_service;

pub use harvest_service::{HarvestService, HarvestSummary};
