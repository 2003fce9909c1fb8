//! 애플리케이션 설정 - `config` crate 기반 계층형 로딩
//!
//! A file (TOML/JSON/YAML, chosen by extension) layered with `CAREER_HARVEST__*`
//! environment overrides. Every section has a default, so a file only needs
//! `[sites.*]` tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::diagnostics::DiagnosticsConfig;
use super::export::ExportConfig;
use super::http_session::HttpSessionConfig;
use crate::domain::SiteTarget;
use crate::extraction::{EngineOptions, PaginationOptions, PatternOverrides, ReadinessOptions, RunOptions};

pub const ENV_PREFIX: &str = "CAREER_HARVEST";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config from file: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }
}

/// Logging section; consumed by `logging::init_logging_with_config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "error", "warn", "info", "debug" or "trace"
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    /// Defaults to `logs/` next to the executable
    pub log_dir: Option<std::path::PathBuf>,
    pub file_name: String,
    /// Roll the file daily instead of appending to one file
    pub daily_rotation: bool,
    pub json_format: bool,
    /// Extra directives, e.g. `"career_harvest::extraction" = "debug"`
    pub module_filters: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: None,
            file_name: "career-harvest.log".to_string(),
            daily_rotation: false,
            json_format: false,
            module_filters: BTreeMap::new(),
        }
    }
}

/// 엔진 공통 설정
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub readiness: ReadinessOptions,
    pub pagination: PaginationOptions,
    pub run: RunOptions,
    pub http: HttpSessionConfig,
}

impl EngineConfig {
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            readiness: self.readiness.clone(),
            pagination: self.pagination.clone(),
            run: self.run.clone(),
        }
    }
}

const fn default_max_pages() -> u32 {
    2
}

const fn default_enabled() -> bool {
    true
}

/// 사이트별 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(alias = "base_url")]
    pub start_url: String,

    /// Appended to `start_url`, URL-encoded
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    /// Adapter identifier; unknown or missing selects the generic engine
    #[serde(default)]
    pub extractor: Option<String>,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default)]
    pub override_patterns: PatternOverrides,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SiteConfig {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            query: BTreeMap::new(),
            extractor: None,
            max_pages: default_max_pages(),
            override_patterns: PatternOverrides::default(),
            enabled: true,
        }
    }

    /// Start URL with the configured query parameters appended
    pub fn full_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.start_url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::invalid("start_url is empty"));
        }
        let mut url = Url::parse(trimmed)
            .map_err(|e| ConfigError::invalid(format!("start_url '{trimmed}' is not a valid URL: {e}")))?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }

    pub fn target(&self, company: &str) -> Result<SiteTarget, ConfigError> {
        Ok(SiteTarget::new(company, self.full_url()?.to_string(), self.max_pages))
    }

    fn validate(&self, company: &str) -> Result<(), ConfigError> {
        if self.max_pages == 0 {
            return Err(ConfigError::invalid(format!("sites.{company}.max_pages must be at least 1")));
        }
        self.full_url()
            .map(|_| ())
            .map_err(|e| ConfigError::invalid(format!("sites.{company}: {e}")))
    }
}

const fn default_concurrency() -> usize {
    2
}

/// 전체 애플리케이션 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub sites: BTreeMap<String, SiteConfig>,
    pub export: ExportConfig,
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
    /// Sites harvested at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            sites: BTreeMap::new(),
            export: ExportConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            logging: LoggingConfig::default(),
            concurrency: default_concurrency(),
        }
    }
}

impl AppConfig {
    /// 설정 파일 + 환경 변수 로드
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        debug!("Loaded configuration from {} ({} sites)", path, config.sites.len());
        Ok(config)
    }

    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency must be at least 1"));
        }
        if self.engine.run.navigation_attempts == 0 {
            return Err(ConfigError::invalid("engine.run.navigation_attempts must be at least 1"));
        }
        if self.engine.readiness.max_attempts == 0 {
            return Err(ConfigError::invalid("engine.readiness.max_attempts must be at least 1"));
        }
        if self.engine.pagination.page_size == 0 {
            return Err(ConfigError::invalid("engine.pagination.page_size must be at least 1"));
        }
        for (company, site) in &self.sites {
            site.validate(company)?;
        }
        Ok(())
    }

    /// Enabled sites in name order, optionally narrowed to `only`
    pub fn selected_sites<'a>(&'a self, only: &[String]) -> Vec<(&'a str, &'a SiteConfig)> {
        self.sites
            .iter()
            .filter(|(name, site)| {
                if only.is_empty() {
                    site.enabled
                } else {
                    only.iter().any(|wanted| wanted.eq_ignore_ascii_case(name))
                }
            })
            .map(|(name, site)| (name.as_str(), site))
            .collect()
    }
}
