//! In-memory fakes for the worker's collaborators (testing only)
//!
//! Provides `MemoryStorage`, `ScriptedTraceGenerator`, and
//! `MemoryReportSink`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{ClovisError, Result};
use crate::report::{ReportRow, ReportSink};
use crate::storage::Storage;
use crate::trace_generator::{TraceGenerator, TraceMetadata, TraceRequest};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Bucket held in a `BTreeMap<object name, contents>`.
#[derive(Debug)]
pub struct MemoryStorage {
    bucket: String,
    objects: Mutex<BTreeMap<String, String>>,
    uploads: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        MemoryStorage {
            bucket: bucket.into(),
            objects: Mutex::new(BTreeMap::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Seed an object without recording an upload.
    pub fn insert(&self, path: &str, contents: &str) {
        lock(&self.objects).insert(path.to_string(), contents.to_string());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        lock(&self.objects).get(path).cloned()
    }

    pub fn object_names(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    /// Object names in upload order.
    pub fn uploads(&self) -> Vec<String> {
        lock(&self.uploads).clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    async fn download_as_string(&self, path: &str) -> Result<Option<String>> {
        Ok(self.get(path))
    }

    async fn upload_string(&self, data: &str, path: &str) -> Result<()> {
        self.insert(path, data);
        lock(&self.uploads).push(path.to_string());
        Ok(())
    }

    async fn upload_file(&self, local: &Path, path: &str) -> Result<()> {
        let data = tokio::fs::read(local).await.map_err(|e| ClovisError::Storage {
            path: path.to_string(),
            message: format!("read {}: {e}", local.display()),
        })?;
        self.upload_string(&String::from_utf8_lossy(&data), path).await
    }
}

// ---------------------------------------------------------------------------
// ScriptedTraceGenerator
// ---------------------------------------------------------------------------

/// Trace generator that succeeds unless the URL was marked failing.
///
/// Successful runs write `{"url": <navigation url>, "metadata": {"fake": true}}`
/// to the trace file. Every run writes a one-line log.
#[derive(Debug, Default)]
pub struct ScriptedTraceGenerator {
    failing: Mutex<BTreeSet<String>>,
    requests: Mutex<Vec<TraceRequest>>,
}

impl ScriptedTraceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, url: &str) {
        lock(&self.failing).insert(url.to_string());
    }

    pub fn requests(&self) -> Vec<TraceRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl TraceGenerator for ScriptedTraceGenerator {
    async fn generate(&self, request: &TraceRequest, trace_file: &Path, log_file: &Path) -> TraceMetadata {
        lock(&self.requests).push(request.clone());
        let _ = tokio::fs::remove_file(trace_file).await;
        let _ = tokio::fs::write(log_file, format!("tracing {}\n", request.navigation_url())).await;

        if lock(&self.failing).contains(&request.url) {
            return TraceMetadata::failed(&request.url);
        }
        let trace = serde_json::json!({
            "url": request.navigation_url(),
            "metadata": {"fake": true},
        });
        if tokio::fs::write(trace_file, trace.to_string()).await.is_err() {
            return TraceMetadata::failed(&request.url);
        }
        let mut metadata = TraceMetadata::failed(&request.url);
        metadata.succeeded = true;
        metadata.extra.insert("fake".to_string(), serde_json::Value::Bool(true));
        metadata
    }
}

// ---------------------------------------------------------------------------
// MemoryReportSink
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryReportSink {
    rows: Mutex<Vec<ReportRow>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        lock(&self.rows).clone()
    }
}

#[async_trait]
impl ReportSink for MemoryReportSink {
    async fn insert_row(&self, row: &ReportRow) -> Result<()> {
        lock(&self.rows).push(row.clone());
        Ok(())
    }
}
