//! Site adapters and the extractor registry
//!
//! One generic engine, parameterized per site by a pattern profile and an
//! optional authoritative pagination strategy. Adapters that need bespoke DOM
//! walking override `extract_page` / `advance`; everything else composes the
//! default engine.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::page_pass::{self, PageExtraction};
use super::pagination_controller::{PaginationController, PaginationOptions};
use super::patterns::{PatternConfig, PatternOverrides, PatternSet};
use crate::domain::{NavigationStrategy, PaginationState};
use crate::infrastructure::browser::{BrowserPage, SessionResult};

pub const GENERIC_ADAPTER_ID: &str = "generic";

#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn id(&self) -> &str;

    /// Base patterns before per-site overrides are applied
    fn pattern_config(&self) -> PatternConfig {
        PatternConfig::default()
    }

    /// Single authoritative strategy, when the layout is known
    fn strategy(&self) -> Option<NavigationStrategy> {
        None
    }

    fn page_size(&self) -> Option<u32> {
        None
    }

    async fn extract_page(&self, page: &mut dyn BrowserPage, patterns: &PatternSet) -> SessionResult<PageExtraction> {
        page_pass::extract_page(page, patterns).await
    }

    async fn advance(
        &self,
        page: &mut dyn BrowserPage,
        state: &mut PaginationState,
        patterns: &PatternSet,
        options: &PaginationOptions,
    ) -> SessionResult<bool> {
        PaginationController::new(patterns, options).advance(page, state).await
    }
}

impl fmt::Debug for dyn SiteAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteAdapter").field("id", &self.id()).finish()
    }
}

/// The engine with the full default pattern library
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericAdapter;

#[async_trait]
impl SiteAdapter for GenericAdapter {
    fn id(&self) -> &str {
        GENERIC_ADAPTER_ID
    }
}

/// Known layout: narrower candidates tried before the defaults, plus a strategy
#[derive(Debug, Clone)]
pub struct ProfileAdapter {
    id: String,
    profile: PatternOverrides,
    strategy: Option<NavigationStrategy>,
    page_size: Option<u32>,
}

impl ProfileAdapter {
    pub fn new(id: impl Into<String>, profile: PatternOverrides) -> Self {
        Self {
            id: id.into(),
            profile,
            strategy: None,
            page_size: None,
        }
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: NavigationStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// SuccessFactors career sites: table rows, `startrow` offset pager
    pub fn successfactors() -> Self {
        let profile = PatternOverrides {
            container: vec!["tr.data-row".into()],
            title: vec!["a.jobTitle-link".into(), ".jobTitle".into()],
            location: vec!["span.jobLocation".into(), ".jobLocation".into()],
            link: vec!["a.jobTitle-link".into()],
            active_page: vec![".pagination li.active a".into()],
            numbered_targets: vec!["startrow={offset}".into()],
            ..PatternOverrides::default()
        };
        Self::new("successfactors", profile)
            .with_strategy(NavigationStrategy::NumberedForm)
            .with_page_size(10)
    }

    /// Drupal Views listings: `.views-row` items with a sequential pager
    pub fn drupal_views() -> Self {
        let profile = PatternOverrides {
            container: vec![".views-row".into()],
            title: vec![".views-field-title a".into(), ".views-field-title".into()],
            location: vec![
                ".views-field-field-location".into(),
                ".views-field-field-job-location".into(),
            ],
            link: vec![".views-field-title a".into()],
            next_page: vec![".pager__item--next a".into(), "li.pager-next a".into()],
            ..PatternOverrides::default()
        };
        Self::new("drupal_views", profile).with_strategy(NavigationStrategy::SequentialLink)
    }
}

#[async_trait]
impl SiteAdapter for ProfileAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn pattern_config(&self) -> PatternConfig {
        PatternConfig::default().with_overrides(&self.profile)
    }

    fn strategy(&self) -> Option<NavigationStrategy> {
        self.strategy
    }

    fn page_size(&self) -> Option<u32> {
        self.page_size
    }
}

/// Lookup table from extractor identifier to adapter
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SiteAdapter>>,
    fallback: Arc<dyn SiteAdapter>,
}

impl AdapterRegistry {
    /// Registry holding only the generic adapter
    pub fn new() -> Self {
        let fallback: Arc<dyn SiteAdapter> = Arc::new(GenericAdapter);
        let mut adapters = HashMap::new();
        adapters.insert(GENERIC_ADAPTER_ID.to_string(), Arc::clone(&fallback));
        Self { adapters, fallback }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ProfileAdapter::successfactors()));
        registry.register(Arc::new(ProfileAdapter::drupal_views()));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        let id = normalize_adapter_id(adapter.id());
        debug!("Registering site adapter '{}'", id);
        self.adapters.insert(id, adapter);
    }

    /// Adapter for `id`; missing or unknown identifiers fall back to the generic engine
    pub fn resolve(&self, id: Option<&str>) -> Arc<dyn SiteAdapter> {
        let Some(raw) = id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Arc::clone(&self.fallback);
        };
        let key = normalize_adapter_id(raw);
        if let Some(adapter) = self.adapters.get(&key) {
            return Arc::clone(adapter);
        }
        warn!("⚠️ No site adapter registered for '{}', using generic engine", raw);
        Arc::clone(&self.fallback)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adapters.contains_key(&normalize_adapter_id(id))
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// `"SuccessFactors_Extractor.Foo"` -> `"successfactors"`
pub fn normalize_adapter_id(id: &str) -> String {
    let module = id.trim().split('.').next().unwrap_or_default().to_ascii_lowercase();
    module
        .strip_suffix("_extractor")
        .map_or_else(|| module.clone(), str::to_string)
}
