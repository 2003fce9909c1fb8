//! Infrastructure layer: browser sessions, configuration, logging and I/O sinks
//!
//! Everything that talks to the outside world lives here; the extraction
//! engine only sees the `BrowserPage` / `SessionFactory` traits and the sink
//! traits.

pub mod browser;
pub mod config;
pub mod diagnostics;
pub mod export;
pub mod http_session;
pub mod logging;
pub mod retry;

pub use browser::{BrowserPage, SessionError, SessionFactory, SessionResult, Snapshot};
pub use config::{AppConfig, ConfigError, EngineConfig, LoggingConfig, SiteConfig};
pub use diagnostics::{DiagnosticsConfig, DiagnosticsError, DiagnosticsSink, FileDiagnostics, NoopDiagnostics};
pub use export::{DelimitedExportSink, ExportConfig, ExportError, ExportSink};
pub use http_session::{HttpSessionConfig, HttpSessionFactory};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use retry::RetryPolicy;
