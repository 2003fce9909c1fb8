//! Extraction orchestrator - one full site run
//!
//! load -> detect-ready -> extract -> dedupe-merge -> advance-or-stop -> repeat
//!
//! The run accumulator is threaded through `step` by value, so one iteration
//! can be exercised on its own. Nothing escapes `run`: every outcome, including
//! a session that never opened, becomes a `RunResult`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::adapter::{GenericAdapter, SiteAdapter};
use super::dedup::{merge, UniqueRecords};
use super::page_pass::PageExtraction;
use super::pagination_controller::PaginationOptions;
use super::patterns::{PatternOverrides, PatternSet};
use super::readiness::{ReadinessDetector, ReadinessOptions};
use crate::domain::{NavigationStrategy, PaginationPhase, PaginationState, RecordStamp, RunResult, RunStatus, SiteTarget};
use crate::infrastructure::browser::{bounded, BrowserPage, SessionError, SessionFactory, SessionResult};
use crate::infrastructure::diagnostics::{artifact_name, DiagnosticsSink, NoopDiagnostics};
use crate::infrastructure::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Attempts for the initial start-page load
    pub navigation_attempts: u32,
    /// Fixed wait between initial load attempts
    pub navigation_backoff_ms: u64,
    pub navigation_timeout_ms: u64,
    /// Pause after every successful advance
    pub page_delay_ms: u64,
    /// Upper bound on extraction and advance, each; readiness is never cut
    /// shorter than the budget its own options need
    pub step_timeout_ms: u64,
    /// Stop when a load-more activation adds no new records
    pub require_growth_after_load_more: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            navigation_attempts: 3,
            navigation_backoff_ms: 5_000,
            navigation_timeout_ms: 60_000,
            page_delay_ms: 3_000,
            step_timeout_ms: 60_000,
            require_growth_after_load_more: true,
        }
    }
}

impl RunOptions {
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub const fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub const fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.navigation_attempts, Duration::from_millis(self.navigation_backoff_ms))
    }
}

/// Tunables of the engine as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub readiness: ReadinessOptions,
    pub pagination: PaginationOptions,
    pub run: RunOptions,
}

/// Immutable per-run inputs derived from the adapter and site overrides
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub patterns: PatternSet,
    pub pagination: PaginationOptions,
}

/// Loop state carried from one step to the next
#[derive(Debug, Clone)]
pub struct RunAccumulator {
    pub records: UniqueRecords,
    pub pages_processed: u32,
    pub state: PaginationState,
}

impl RunAccumulator {
    pub fn new(max_pages: u32) -> Self {
        Self {
            records: UniqueRecords::new(),
            pages_processed: 0,
            state: PaginationState::new(max_pages),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub status: RunStatus,
    pub error: Option<String>,
}

impl Termination {
    pub const fn completed() -> Self {
        Self {
            status: RunStatus::Completed,
            error: None,
        }
    }

    pub fn partial(reason: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Partial,
            error: Some(reason.into()),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            error: Some(reason.into()),
        }
    }
}

#[derive(Debug)]
pub enum Step {
    Continue(RunAccumulator),
    Finished(RunAccumulator, Termination),
}

pub struct ExtractionOrchestrator {
    target: SiteTarget,
    sessions: Arc<dyn SessionFactory>,
    adapter: Arc<dyn SiteAdapter>,
    engine: EngineOptions,
    diagnostics: Arc<dyn DiagnosticsSink>,
    overrides: PatternOverrides,
}

impl ExtractionOrchestrator {
    pub fn new(target: SiteTarget, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            target,
            sessions,
            adapter: Arc::new(GenericAdapter),
            engine: EngineOptions::default(),
            diagnostics: Arc::new(NoopDiagnostics),
            overrides: PatternOverrides::default(),
        }
    }

    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn SiteAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: EngineOptions) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn with_pattern_overrides(mut self, overrides: PatternOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub const fn target(&self) -> &SiteTarget {
        &self.target
    }

    /// Patterns and pagination options for this site
    pub fn plan(&self) -> RunPlan {
        let patterns = self.adapter.pattern_config().with_overrides(&self.overrides).compile();
        let mut pagination = self.engine.pagination.clone();
        if pagination.strategy.is_none() {
            pagination.strategy = self.adapter.strategy();
        }
        if let Some(page_size) = self.adapter.page_size() {
            pagination.page_size = page_size;
        }
        RunPlan { patterns, pagination }
    }

    /// Execute one full run; never fails past this boundary
    pub async fn run(&self) -> RunResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "🚀 Run {} started: {} ({}, adapter '{}', max_pages {})",
            run_id,
            self.target.company,
            self.target.start_url,
            self.adapter.id(),
            self.target.max_pages
        );

        let mut page = match self.sessions.open(&self.target).await {
            Ok(page) => page,
            Err(e) => {
                error!("❌ Could not open a session for {}: {}", self.target.company, e);
                return RunResult::failed_before_start(
                    run_id,
                    self.target.company.clone(),
                    started_at,
                    format!("Session could not be opened: {e}"),
                );
            }
        };

        let plan = self.plan();
        let (accumulator, termination) = self.drive(&plan, page.as_mut()).await;

        let diagnostic = if termination.status == RunStatus::Failed {
            self.capture_diagnostic(page.as_mut()).await
        } else {
            None
        };

        if let Err(e) = page.close().await {
            warn!("⚠️ Closing the page for {} failed: {}", self.target.company, e);
        }

        let result = RunResult {
            run_id,
            company: self.target.company.clone(),
            records: accumulator.records.into_records(),
            pages_processed: accumulator.pages_processed,
            status: termination.status,
            started_at,
            finished_at: Utc::now(),
            error: termination.error,
            diagnostic,
        };

        match result.status {
            RunStatus::Completed => info!(
                "✅ Run {} completed: {} unique records from {} pages",
                run_id,
                result.record_count(),
                result.pages_processed
            ),
            RunStatus::Partial | RunStatus::Failed => warn!(
                "⚠️ Run {} ended {}: {} unique records from {} pages ({})",
                run_id,
                result.status,
                result.record_count(),
                result.pages_processed,
                result.error.as_deref().unwrap_or("no detail")
            ),
        }
        result
    }

    async fn drive(&self, plan: &RunPlan, page: &mut dyn BrowserPage) -> (RunAccumulator, Termination) {
        let mut accumulator = RunAccumulator::new(self.target.max_pages);

        if let Err(e) = self.load_start_page(page).await {
            error!("❌ Initial load of {} failed: {}", self.target.start_url, e);
            accumulator.state.fail();
            return (accumulator, Termination::failed(format!("Initial load failed: {e}")));
        }
        accumulator.state.mark_ready();

        loop {
            match self.step(plan, page, accumulator).await {
                Step::Continue(next) => accumulator = next,
                Step::Finished(done, termination) => return (done, termination),
            }
        }
    }

    /// Navigate to the start URL with fixed-backoff retries
    pub async fn load_start_page(&self, page: &mut dyn BrowserPage) -> SessionResult<()> {
        let policy = self.engine.run.retry_policy();
        let timeout = self.engine.run.navigation_timeout();
        let url = self.target.start_url.as_str();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match bounded("goto", timeout, page.goto(url, timeout)).await {
                Ok(()) => {
                    debug!("Start page loaded on attempt {}: {}", attempt, url);
                    return Ok(());
                }
                Err(e) if policy.should_retry(attempt, &e) => {
                    warn!(
                        "🔄 Load attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt,
                        policy.max_attempts,
                        url,
                        e,
                        policy.delay_for(attempt)
                    );
                    policy.wait(attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One iteration: readiness, extraction, merge, then stop or advance
    pub async fn step(&self, plan: &RunPlan, page: &mut dyn BrowserPage, mut acc: RunAccumulator) -> Step {
        let page_index = acc.state.current_page_index();
        let step_timeout = self.engine.run.step_timeout();

        let detector = ReadinessDetector::new(&plan.patterns, &self.engine.readiness);
        let readiness_bound = step_timeout.max(self.engine.readiness.budget());
        match bounded("readiness", readiness_bound, detector.is_ready(page)).await {
            Ok(true) => {}
            Ok(false) => warn!("⚠️ Page {} not ready; extracting best-effort", page_index),
            Err(e) if e.is_fatal() => return Self::session_lost(acc, page_index, &e),
            Err(e) => warn!("⚠️ Readiness check on page {} failed ({}); extracting best-effort", page_index, e),
        }

        let extraction = match self.extract_with_retry(plan, page, page_index).await {
            Ok(extraction) => extraction,
            Err(e) if e.is_fatal() => return Self::session_lost(acc, page_index, &e),
            Err(e) => {
                warn!("⚠️ Extraction of page {} failed twice ({}); keeping {} records", page_index, e, acc.records.len());
                acc.state.fail();
                let reason = format!("Extraction failed on page {page_index}: {e}");
                return Step::Finished(acc, Termination::partial(reason));
            }
        };

        let stamp = RecordStamp::now(self.target.company.clone());
        let outcome = merge(acc.records, extraction.records, &stamp);
        acc.records = outcome.records;
        acc.pages_processed += 1;
        info!(
            "📄 Page {}/{}: {} containers, {} new, {} duplicates, {} total",
            page_index,
            acc.state.max_pages(),
            extraction.containers_seen,
            outcome.added,
            outcome.duplicates,
            acc.records.len()
        );

        if page_index > 1
            && acc.state.strategy() == NavigationStrategy::LoadMore
            && self.engine.run.require_growth_after_load_more
            && outcome.added == 0
        {
            info!("🏁 Load more on page {} added no new records; stopping", page_index);
            acc.state.exhaust();
            return Step::Finished(acc, Termination::completed());
        }

        if acc.state.at_last_page() {
            debug!("Reached max_pages {}", acc.state.max_pages());
            acc.state.exhaust();
            return Step::Finished(acc, Termination::completed());
        }

        let advanced = bounded(
            "advance",
            step_timeout,
            self.adapter.advance(page, &mut acc.state, &plan.patterns, &plan.pagination),
        )
        .await;

        match advanced {
            Ok(true) => {
                tokio::time::sleep(self.engine.run.page_delay()).await;
                Step::Continue(acc)
            }
            Ok(false) if acc.state.phase() == PaginationPhase::Failed => {
                let reason = format!("Pagination failed after page {page_index}");
                Step::Finished(acc, Termination::partial(reason))
            }
            Ok(false) => Step::Finished(acc, Termination::completed()),
            Err(e) if e.is_fatal() => Self::session_lost(acc, page_index, &e),
            Err(e) => {
                acc.state.fail();
                let reason = format!("Pagination failed after page {page_index}: {e}");
                Step::Finished(acc, Termination::partial(reason))
            }
        }
    }

    /// Extraction pass bounded by the step timeout; a transient failure gets one more read
    async fn extract_with_retry(
        &self,
        plan: &RunPlan,
        page: &mut dyn BrowserPage,
        page_index: u32,
    ) -> SessionResult<PageExtraction> {
        let step_timeout = self.engine.run.step_timeout();
        match bounded("extract_page", step_timeout, self.adapter.extract_page(page, &plan.patterns)).await {
            Err(e) if e.is_transient() => {
                warn!("🔄 Extraction of page {} failed ({}); retrying once", page_index, e);
                bounded("extract_page", step_timeout, self.adapter.extract_page(page, &plan.patterns)).await
            }
            other => other,
        }
    }

    fn session_lost(mut acc: RunAccumulator, page_index: u32, e: &SessionError) -> Step {
        error!("❌ Session failure on page {}: {}", page_index, e);
        acc.state.fail();
        Step::Finished(acc, Termination::failed(format!("Session failure on page {page_index}: {e}")))
    }

    /// Best-effort snapshot; every failure is logged and swallowed
    async fn capture_diagnostic(&self, page: &mut dyn BrowserPage) -> Option<String> {
        let name = artifact_name(Utc::now());
        let snapshot = match bounded("snapshot", self.engine.run.step_timeout(), page.snapshot()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("⚠️ Diagnostic snapshot unavailable: {}", e);
                return None;
            }
        };

        match self.diagnostics.capture(&name, &snapshot).await {
            Ok(location) => Some(location),
            Err(e) => {
                warn!("⚠️ Diagnostic capture failed: {}", e);
                None
            }
        }
    }
}
