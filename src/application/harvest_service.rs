//! Multi-site harvest driver
//!
//! Runs the configured sites with a bounded number of concurrent sessions,
//! keeps results in configuration order and hands each one to the export
//! sink. One site failing never stops the others.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{RunResult, RunStatus};
use crate::extraction::{AdapterRegistry, EngineOptions, ExtractionOrchestrator};
use crate::infrastructure::config::{AppConfig, SiteConfig};
use crate::infrastructure::diagnostics::{DiagnosticsSink, NoopDiagnostics};
use crate::infrastructure::export::ExportSink;
use crate::infrastructure::browser::SessionFactory;

/// Aggregate outcome of one harvest
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestSummary {
    /// One result per site, in the order the sites were given
    pub runs: Vec<RunResult>,
    /// Rows the export sink accepted
    pub exported: usize,
}

impl HarvestSummary {
    pub fn total_records(&self) -> usize {
        self.runs.iter().map(RunResult::record_count).sum()
    }

    pub fn count(&self, status: RunStatus) -> usize {
        self.runs.iter().filter(|run| run.status == status).count()
    }

    /// Pretty JSON report of every run
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// True when there was at least one run and none of them got anywhere
    pub fn all_failed(&self) -> bool {
        !self.runs.is_empty() && self.runs.iter().all(RunResult::is_failed)
    }
}

pub struct HarvestService {
    engine: EngineOptions,
    sessions: Arc<dyn SessionFactory>,
    registry: AdapterRegistry,
    export: Option<Arc<dyn ExportSink>>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    concurrency: usize,
}

impl HarvestService {
    pub fn new(engine: EngineOptions, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            engine,
            sessions,
            registry: AdapterRegistry::with_builtins(),
            export: None,
            diagnostics: Arc::new(NoopDiagnostics),
            concurrency: 1,
        }
    }

    pub fn from_config(config: &AppConfig, sessions: Arc<dyn SessionFactory>) -> Self {
        Self::new(config.engine.options(), sessions).with_concurrency(config.concurrency)
    }

    #[must_use]
    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_export(mut self, export: Arc<dyn ExportSink>) -> Self {
        self.export = Some(export);
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub const fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Orchestrator for one configured site
    pub fn orchestrator(&self, company: &str, site: &SiteConfig) -> Result<ExtractionOrchestrator, String> {
        let target = site.target(company).map_err(|e| e.to_string())?;
        Ok(ExtractionOrchestrator::new(target, Arc::clone(&self.sessions))
            .with_adapter(self.registry.resolve(site.extractor.as_deref()))
            .with_engine(self.engine.clone())
            .with_diagnostics(Arc::clone(&self.diagnostics))
            .with_pattern_overrides(site.override_patterns.clone()))
    }

    pub async fn run_site(&self, company: &str, site: &SiteConfig) -> RunResult {
        match self.orchestrator(company, site) {
            Ok(orchestrator) => orchestrator.run().await,
            Err(reason) => {
                error!("❌ {} skipped: {}", company, reason);
                RunResult::failed_before_start(Uuid::new_v4(), company, Utc::now(), reason)
            }
        }
    }

    /// Harvest every site; results come back in input order
    pub async fn run_all(&self, sites: &[(String, SiteConfig)]) -> HarvestSummary {
        info!("🌾 Harvesting {} sites ({} at a time)", sites.len(), self.concurrency);

        let results: Vec<(RunResult, usize)> = stream::iter(sites)
            .map(|(company, site)| self.run_site(company, site))
            .buffered(self.concurrency)
            .then(|result| async move {
                let exported = self.export(&result).await;
                (result, exported)
            })
            .collect()
            .await;

        let exported = results.iter().map(|(_, n)| n).sum();
        let summary = HarvestSummary {
            runs: results.into_iter().map(|(run, _)| run).collect(),
            exported,
        };

        info!(
            "🏁 Harvest finished: {} records, {} completed, {} partial, {} failed",
            summary.total_records(),
            summary.count(RunStatus::Completed),
            summary.count(RunStatus::Partial),
            summary.count(RunStatus::Failed)
        );
        summary
    }

    async fn export(&self, result: &RunResult) -> usize {
        let Some(sink) = &self.export else {
            return 0;
        };
        match sink.append(&result.company, &result.records).await {
            Ok(written) => written,
            Err(e) => {
                warn!("⚠️ Export for {} failed: {}", result.company, e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobRecord;
    use crate::infrastructure::export::ExportError;
    use crate::test_utils::{quick_engine, ScriptedSite};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        rows: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ExportSink for MemorySink {
        async fn append(&self, company: &str, records: &[JobRecord]) -> Result<usize, ExportError> {
            let mut rows = self.rows.lock().await;
            rows.extend(records.iter().map(|r| (company.to_string(), r.title.clone())));
            Ok(records.len())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl ExportSink for BrokenSink {
        async fn append(&self, _company: &str, _records: &[JobRecord]) -> Result<usize, ExportError> {
            Err(ExportError::InvalidDelimiter { delimiter: 'x' })
        }
    }

    fn listing(titles: &[&str]) -> String {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| format!(r#"<div class="job-card"><h3 class="job-title">{t}</h3><a href="/jobs/{i}">Apply</a></div>"#))
            .collect()
    }

    fn site_config(url: &str) -> SiteConfig {
        let mut site = SiteConfig::new(url);
        site.max_pages = 1;
        site
    }

    #[tokio::test]
    async fn test_failing_site_does_not_stop_the_others() {
        let site = ScriptedSite::new()
            .screen("a", "https://a.test/jobs", &listing(&["Engineer", "Analyst"]))
            .screen("c", "https://c.test/jobs", &listing(&["Designer"]));
        let sink = Arc::new(MemorySink::default());
        let service = HarvestService::new(quick_engine(), Arc::new(site.factory()))
            .with_export(sink.clone())
            .with_concurrency(2);

        let sites = vec![
            ("Alpha".to_string(), site_config("https://a.test/jobs")),
            ("Bravo".to_string(), site_config("https://b.test/missing")),
            ("Charlie".to_string(), site_config("https://c.test/jobs")),
        ];
        let summary = service.run_all(&sites).await;

        let companies: Vec<&str> = summary.runs.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(companies, vec!["Alpha", "Bravo", "Charlie"]);
        assert_eq!(summary.runs[0].status, RunStatus::Completed);
        assert_eq!(summary.runs[1].status, RunStatus::Failed);
        assert_eq!(summary.runs[2].status, RunStatus::Completed);
        assert_eq!(summary.total_records(), 3);
        assert_eq!(summary.exported, 3);
        assert!(!summary.all_failed());

        let report: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(report["runs"][1]["status"], "FAILED");
        assert_eq!(report["runs"][2]["records"][0]["title"], "Designer");

        let rows = sink.rows.lock().await;
        assert_eq!(rows[0], ("Alpha".to_string(), "Engineer".to_string()));
        assert_eq!(rows[2], ("Charlie".to_string(), "Designer".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_site_becomes_failed_result() {
        let site = ScriptedSite::new();
        let service = HarvestService::new(quick_engine(), Arc::new(site.factory()));

        let summary = service.run_all(&[("Broken".to_string(), site_config("not a url"))]).await;
        assert_eq!(summary.runs.len(), 1);
        assert!(summary.runs[0].error.as_deref().unwrap_or_default().contains("start_url"));
        assert!(summary.all_failed());
        assert_eq!(site.opened(), 0);
    }

    #[tokio::test]
    async fn test_export_errors_are_not_fatal() {
        let site = ScriptedSite::new().screen("a", "https://a.test/jobs", &listing(&["Engineer"]));
        let service = HarvestService::new(quick_engine(), Arc::new(site.factory())).with_export(Arc::new(BrokenSink));

        let summary = service.run_all(&[("Alpha".to_string(), site_config("https://a.test/jobs"))]).await;
        assert_eq!(summary.runs[0].status, RunStatus::Completed);
        assert_eq!(summary.exported, 0);
    }

    #[test]
    fn test_unknown_extractor_falls_back_to_generic() {
        let site = ScriptedSite::new();
        let service = HarvestService::new(quick_engine(), Arc::new(site.factory()));
        let mut config = site_config("https://a.test/jobs");
        config.extractor = Some("no_such_extractor".to_string());
        assert!(service.orchestrator("Alpha", &config).is_ok());
        assert!(service.registry().contains("successfactors"));
    }
}
