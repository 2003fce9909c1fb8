//! Export sink for harvested records
//!
//! One delimited file per harvest (`{stem}_{YYYYmmdd_HHMMSS}.csv|tsv`), header
//! written on creation, every run's records appended after it.

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::JobRecord;

pub const EXPORT_HEADERS: [&str; 7] = ["company", "title", "location", "url", "job_id", "timestamp", "source"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported delimiter {delimiter:?}; expected ',', ';', '|' or tab")]
    InvalidDelimiter { delimiter: char },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
    pub file_stem: String,
    pub delimiter: char,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: PathBuf::from("output"),
            file_stem: "all_jobs".to_string(),
            delimiter: ',',
        }
    }
}

#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Append `records` discovered for `company`; returns the rows written
    async fn append(&self, company: &str, records: &[JobRecord]) -> Result<usize, ExportError>;
}

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write one delimited row, quoting per RFC 4180
pub fn write_row<W: Write>(mut w: W, row: &[&str], sep: char) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{sep}")?;
        }
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}

pub struct DelimitedExportSink {
    path: PathBuf,
    delimiter: char,
    write_lock: Mutex<()>,
}

impl DelimitedExportSink {
    /// Create the timestamped file and write its header
    pub async fn create(config: &ExportConfig) -> Result<Self, ExportError> {
        let extension = match config.delimiter {
            '\t' => "tsv",
            ',' | ';' | '|' => "csv",
            other => return Err(ExportError::InvalidDelimiter { delimiter: other }),
        };
        let file_name = format!("{}_{}.{extension}", config.file_stem, Local::now().format("%Y%m%d_%H%M%S"));
        let path = config.output_dir.join(file_name);

        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .map_err(|source| io_error(&config.output_dir, source))?;

        let mut header = Vec::new();
        write_row(&mut header, &EXPORT_HEADERS, config.delimiter).map_err(|source| io_error(&path, source))?;
        tokio::fs::write(&path, header).await.map_err(|source| io_error(&path, source))?;

        info!("💾 Export file created: {}", path.display());
        Ok(Self {
            path,
            delimiter: config.delimiter,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, company: &str, records: &[JobRecord]) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        for record in records {
            let timestamp = record.discovered_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string();
            let row = [
                company,
                record.title.as_str(),
                record.location.as_str(),
                record.url_or_empty(),
                record.external_id.as_deref().unwrap_or_default(),
                timestamp.as_str(),
                record.company.as_str(),
            ];
            write_row(&mut buffer, &row, self.delimiter)?;
        }
        Ok(buffer)
    }
}

fn io_error(path: &Path, source: io::Error) -> ExportError {
    ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl ExportSink for DelimitedExportSink {
    async fn append(&self, company: &str, records: &[JobRecord]) -> Result<usize, ExportError> {
        if records.is_empty() {
            debug!("Nothing to export for {}", company);
            return Ok(0);
        }

        let buffer = self.encode(company, records).map_err(|source| io_error(&self.path, source))?;

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| io_error(&self.path, source))?;
        file.write_all(&buffer).await.map_err(|source| io_error(&self.path, source))?;
        file.flush().await.map_err(|source| io_error(&self.path, source))?;

        info!("💾 Appended {} records for {} to {}", records.len(), company, self.path.display());
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawRecord, RecordStamp};

    fn record(title: &str, location: &str) -> JobRecord {
        RawRecord {
            title: title.to_string(),
            location: location.to_string(),
            url: Some("https://x.io/jobs/1".to_string()),
            external_id: Some("1".to_string()),
        }
        .into_job(&RecordStamp::now("Acme"))
    }

    #[test]
    fn test_write_row_quotes_when_needed() {
        let mut out = Vec::new();
        write_row(&mut out, &["plain", "a,b", "say \"hi\"", "x\ny"], ',').unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "plain,\"a,b\",\"say \"\"hi\"\"\",\"x\ny\"\n"
        );
    }

    #[tokio::test]
    async fn test_runs_are_appended_after_header() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            output_dir: dir.path().to_path_buf(),
            ..ExportConfig::default()
        };
        let sink = DelimitedExportSink::create(&config).await.unwrap();

        assert_eq!(sink.append("Acme", &[record("Engineer", "Pune, IN")]).await.unwrap(), 1);
        assert_eq!(sink.append("Acme", &[record("Analyst", "")]).await.unwrap(), 1);
        assert_eq!(sink.append("Acme", &[]).await.unwrap(), 0);

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "company,title,location,url,job_id,timestamp,source");
        assert!(lines[1].starts_with("Acme,Engineer,\"Pune, IN\",https://x.io/jobs/1,1,"));
        assert!(lines[2].starts_with("Acme,Analyst,,https://x.io/jobs/1,1,"));
        assert!(lines[2].ends_with(",Acme"));
    }

    #[tokio::test]
    async fn test_tab_delimiter_produces_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            output_dir: dir.path().to_path_buf(),
            delimiter: '\t',
            ..ExportConfig::default()
        };
        let sink = DelimitedExportSink::create(&config).await.unwrap();
        assert_eq!(sink.path().extension().and_then(|e| e.to_str()), Some("tsv"));
    }

    #[tokio::test]
    async fn test_invalid_delimiter_is_rejected() {
        let config = ExportConfig {
            delimiter: 'x',
            ..ExportConfig::default()
        };
        assert!(matches!(
            DelimitedExportSink::create(&config).await,
            Err(ExportError::InvalidDelimiter { delimiter: 'x' })
        ));
    }
}
