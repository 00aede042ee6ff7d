use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use uuid::Uuid;

// @module: Experiment metrics sink used by the pipeline and tool clients

/// Measurements of one tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub latency_ms: f64,
    pub request_bytes: usize,
    pub response_bytes: usize,
    pub success: bool,
}

/// Destination for run parameters, metrics and artifacts.
///
/// Every operation is best effort. Values logged outside an active run are
/// dropped.
pub trait MetricsSink: Send + Sync {
    /// Start a new run, ending the active one if any
    fn start_run(&self, run_name: &str);

    /// End the active run
    fn end_run(&self, status: &str);

    fn log_params(&self, params: &[(&str, String)]);

    fn log_metric(&self, key: &str, value: f64);

    fn log_artifact(&self, path: &Path);

    /// Log the per-tool metrics of one call
    fn log_tool_call(&self, record: &ToolCallRecord) {
        let prefix = format!("tool_{}", record.tool_name);
        self.log_metric(&format!("{}_latency_ms", prefix), record.latency_ms);
        self.log_metric(&format!("{}_request_bytes", prefix), record.request_bytes as f64);
        self.log_metric(&format!("{}_response_bytes", prefix), record.response_bytes as f64);
        self.log_metric(&format!("{}_success", prefix), if record.success { 1.0 } else { 0.0 });
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn start_run(&self, _run_name: &str) {}
    fn end_run(&self, _status: &str) {}
    fn log_params(&self, _params: &[(&str, String)]) {}
    fn log_metric(&self, _key: &str, _value: f64) {}
    fn log_artifact(&self, _path: &Path) {}
}

#[derive(Debug, Clone)]
struct ActiveRun {
    id: Uuid,
    name: String,
}

/// Sink appending one JSON object per event to a local file
pub struct JsonlMetrics {
    path: PathBuf,
    experiment: String,
    active: Mutex<Option<ActiveRun>>,
}

impl JsonlMetrics {
    pub fn new<P: AsRef<Path>>(path: P, experiment: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            experiment: experiment.to_string(),
            active: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Id of the active run, if any
    pub fn active_run_id(&self) -> Option<Uuid> {
        self.active.lock().as_ref().map(|run| run.id)
    }

    fn append(&self, run: &ActiveRun, event: &str, fields: Map<String, Value>) {
        let mut record = Map::new();
        record.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
        record.insert("experiment".to_string(), json!(self.experiment));
        record.insert("run_id".to_string(), json!(run.id.to_string()));
        record.insert("run_name".to_string(), json!(run.name));
        record.insert("event".to_string(), json!(event));
        record.extend(fields);

        if let Err(e) = self.write_line(&Value::Object(record)) {
            warn!("Failed to write metrics to {}: {}", self.path.display(), e);
        }
    }

    fn write_line(&self, record: &Value) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", record)
    }

    fn with_active_run(&self, event: &str, fields: Map<String, Value>) {
        let active = self.active.lock().clone();
        match active {
            Some(run) => self.append(&run, event, fields),
            None => debug!("Dropping '{}' metrics event outside of a run", event),
        }
    }
}

impl MetricsSink for JsonlMetrics {
    fn start_run(&self, run_name: &str) {
        let previous = self.active.lock().take();
        if let Some(run) = previous {
            self.append(&run, "run_end", fields([("status", json!("superseded"))]));
        }

        let run = ActiveRun {
            id: Uuid::new_v4(),
            name: run_name.to_string(),
        };
        self.append(&run, "run_start", Map::new());
        *self.active.lock() = Some(run);
    }

    fn end_run(&self, status: &str) {
        let finished = self.active.lock().take();
        if let Some(run) = finished {
            self.append(&run, "run_end", fields([("status", json!(status))]));
        }
    }

    fn log_params(&self, params: &[(&str, String)]) {
        let params: Map<String, Value> = params
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect();
        self.with_active_run("params", fields([("params", Value::Object(params))]));
    }

    fn log_metric(&self, key: &str, value: f64) {
        self.with_active_run("metric", fields([("key", json!(key)), ("value", json!(value))]));
    }

    fn log_artifact(&self, path: &Path) {
        self.with_active_run(
            "artifact",
            fields([("path", json!(path.display().to_string()))]),
        );
    }
}

fn fields<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
