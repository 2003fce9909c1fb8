//! Failure diagnostics collaborator
//!
//! Receives a best-effort page snapshot when a run fails. Callers swallow
//! every error from here; a lost artifact never changes a run's outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use super::browser::Snapshot;

#[derive(Error, Debug)]
pub enum DiagnosticsError {
    #[error("Failed to write diagnostic artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub directory: PathBuf,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("diagnostics"),
        }
    }
}

/// `error_<ISO-8601 basic timestamp>`, e.g. `error_20250114T093012.417Z`
pub fn artifact_name(at: DateTime<Utc>) -> String {
    format!("error_{}", at.format("%Y%m%dT%H%M%S%.3fZ"))
}

#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    /// Persist `snapshot` under `name`; returns where it went
    async fn capture(&self, name: &str, snapshot: &Snapshot) -> Result<String, DiagnosticsError>;
}

/// Writes `<directory>/<name>.<ext>`
#[derive(Debug, Clone)]
pub struct FileDiagnostics {
    directory: PathBuf,
}

impl FileDiagnostics {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl DiagnosticsSink for FileDiagnostics {
    async fn capture(&self, name: &str, snapshot: &Snapshot) -> Result<String, DiagnosticsError> {
        let path = self.directory.join(format!("{name}.{}", snapshot.extension));
        let io_error = |source| DiagnosticsError::Io {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.directory).await.map_err(io_error)?;
        tokio::fs::write(&path, &snapshot.bytes).await.map_err(io_error)?;

        info!("📸 Diagnostic snapshot saved: {}", path.display());
        Ok(path.display().to_string())
    }
}

/// Discards every snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

#[async_trait]
impl DiagnosticsSink for NoopDiagnostics {
    async fn capture(&self, name: &str, _snapshot: &Snapshot) -> Result<String, DiagnosticsError> {
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_artifact_name_is_timestamped() {
        let at = Utc.with_ymd_and_hms(2025, 1, 14, 9, 30, 12).unwrap();
        assert_eq!(artifact_name(at), "error_20250114T093012.000Z");
    }

    #[tokio::test]
    async fn test_file_diagnostics_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileDiagnostics::new(dir.path().join("nested"));
        let snapshot = Snapshot {
            bytes: b"<html>boom</html>".to_vec(),
            extension: "html".into(),
        };

        let written = sink.capture("error_x", &snapshot).await.unwrap();
        assert!(written.ends_with("error_x.html"));
        let content = std::fs::read_to_string(dir.path().join("nested/error_x.html")).unwrap();
        assert_eq!(content, "<html>boom</html>");
    }
}
