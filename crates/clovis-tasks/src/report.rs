//! Report rows built from collected traces, and where they go.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{ClovisError, Result};

/// One report row per trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub url: String,
    pub trace_path: String,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ReportRow {
    /// Build a row from a trace document.
    ///
    /// The URL comes from the trace's top-level `url`, falling back to
    /// `metadata.url`. Returns `None` when neither is present.
    pub fn from_trace(trace_path: &str, trace: &serde_json::Value, timestamp: DateTime<Utc>) -> Option<Self> {
        let metadata = trace
            .get("metadata")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        let url = trace
            .get("url")
            .or_else(|| metadata.get("url"))
            .and_then(serde_json::Value::as_str)?
            .to_string();
        Some(ReportRow {
            url,
            trace_path: trace_path.to_string(),
            metadata,
            timestamp,
        })
    }
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn insert_row(&self, row: &ReportRow) -> Result<()>;
}

/// [`ReportSink`] appending one JSON object per line to a local file.
#[derive(Debug, Clone)]
pub struct JsonLinesReportSink {
    path: PathBuf,
}

impl JsonLinesReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonLinesReportSink { path: path.into() }
    }
}

#[async_trait]
impl ReportSink for JsonLinesReportSink {
    async fn insert_row(&self, row: &ReportRow) -> Result<()> {
        let mut line = serde_json::to_string(row)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ClovisError::ReportSink(format!("{}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_prefers_top_level_url() {
        let now = Utc::now();
        let trace = json!({"url": "http://a.com", "metadata": {"url": "http://b.com", "date": "x"}});
        let row = ReportRow::from_trace("gs://b/traces/a/0", &trace, now).unwrap();
        assert_eq!(row.url, "http://a.com");
        assert_eq!(row.metadata["date"], "x");
        assert_eq!(row.timestamp, now);
    }

    #[test]
    fn test_row_falls_back_to_metadata_url() {
        let trace = json!({"metadata": {"url": "http://b.com"}});
        let row = ReportRow::from_trace("p", &trace, Utc::now()).unwrap();
        assert_eq!(row.url, "http://b.com");
    }

    #[test]
    fn test_trace_without_url_yields_no_row() {
        assert!(ReportRow::from_trace("p", &json!({"events": []}), Utc::now()).is_none());
    }

    #[tokio::test]
    async fn test_json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        let sink = JsonLinesReportSink::new(&path);
        let trace = json!({"url": "http://a.com"});
        for p in ["t/0", "t/1"] {
            let row = ReportRow::from_trace(p, &trace, Utc::now()).unwrap();
            sink.insert_row(&row).await.unwrap();
        }

        let written = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<ReportRow> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].trace_path, "t/1");
    }
}
