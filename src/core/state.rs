//! Execution state models

use crate::core::{node::NodeStatus, pipeline::PipelineStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One terminal transition of a node, appended once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub node_id: String,

    /// Absent for nodes that never started (blocked)
    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: DateTime<Utc>,

    /// Milliseconds between start and completion
    pub duration_ms: Option<i64>,

    pub status: NodeStatus,

    #[serde(flatten)]
    pub outcome: LogOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutcome {
    ResultMetadata(Option<Value>),
    Error(String),
}

impl ExecutionLogEntry {
    pub fn completed(node_id: &str, started_at: Option<DateTime<Utc>>, result: Option<Value>) -> Self {
        Self::new(node_id, started_at, NodeStatus::Completed, LogOutcome::ResultMetadata(result))
    }

    pub fn failed(node_id: &str, started_at: Option<DateTime<Utc>>, error: impl Into<String>) -> Self {
        Self::new(node_id, started_at, NodeStatus::Error, LogOutcome::Error(error.into()))
    }

    fn new(node_id: &str, started_at: Option<DateTime<Utc>>, status: NodeStatus, outcome: LogOutcome) -> Self {
        let completed_at = Utc::now();
        Self {
            node_id: node_id.to_string(),
            started_at,
            completed_at,
            duration_ms: started_at.map(|s| (completed_at - s).num_milliseconds()),
            status,
            outcome,
        }
    }
}

/// Append-only log of terminal node transitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionLog {
    entries: Vec<ExecutionLogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: ExecutionLogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ExecutionLogEntry] {
        &self.entries
    }

    /// Latest entry recorded for a node
    pub fn last_for(&self, node_id: &str) -> Option<&ExecutionLogEntry> {
        self.entries.iter().rev().find(|e| e.node_id == node_id)
    }
}

/// Per-run bookkeeping kept by the store
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// When the current run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the current run settled
    pub completed_at: Option<DateTime<Utc>>,

    /// When each in-flight node was accepted by its executor
    pub node_started: BTreeMap<String, DateTime<Utc>>,

    /// Blocked node -> failed node that caused it
    pub blocked: BTreeMap<String, String>,

    /// A save failed and local state is ahead of the remote copy
    pub unsynced: bool,
}

impl RunState {
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.completed_at = None;
        self.node_started.clear();
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }
}

/// Outcome of a pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub pipeline_id: String,

    pub status: PipelineStatus,

    pub completed: Vec<String>,

    /// Nodes whose own job failed or was cancelled, with the message
    pub failed: BTreeMap<String, String>,

    /// Nodes that never ran because a dependency failed, with the root cause
    pub blocked: BTreeMap<String, String>,

    pub log: Vec<ExecutionLogEntry>,

    pub unsynced: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    /// Fraction of nodes that completed (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        let total = self.completed.len() + self.failed.len() + self.blocked.len();
        if total == 0 {
            return 0.0;
        }
        self.completed.len() as f64 / total as f64
    }
}
