//! Pipeline node and edge domain model

use crate::core::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The closed set of job kinds a pipeline can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    /// User-provided data, completed locally without a remote job
    Input,
    BackboneDesign,
    SequenceDesign,
    StructurePrediction,
    Docking,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::Input,
        NodeType::BackboneDesign,
        NodeType::SequenceDesign,
        NodeType::StructurePrediction,
        NodeType::Docking,
    ];

    /// Wire name of the node type
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Input => "input",
            NodeType::BackboneDesign => "backbone-design",
            NodeType::SequenceDesign => "sequence-design",
            NodeType::StructurePrediction => "structure-prediction",
            NodeType::Docking => "docking",
        }
    }

    /// Remote service that runs this node type, if any
    pub fn default_service(&self) -> Option<&'static str> {
        match self {
            NodeType::Input => None,
            NodeType::BackboneDesign => Some("rfdiffusion"),
            NodeType::SequenceDesign => Some("proteinmpnn"),
            NodeType::StructurePrediction => Some("alphafold"),
            NodeType::Docking => Some("diffdock"),
        }
    }

    /// Config keys that must be present before the node may be queued
    pub fn required_config(&self) -> &'static [&'static str] {
        match self {
            NodeType::BackboneDesign => &["length"],
            NodeType::Input
            | NodeType::SequenceDesign
            | NodeType::StructurePrediction
            | NodeType::Docking => &[],
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            NodeType::Input => "Input",
            NodeType::BackboneDesign => "Backbone Design",
            NodeType::SequenceDesign => "Sequence Design",
            NodeType::StructurePrediction => "Structure Prediction",
            NodeType::Docking => "Docking",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown node type: {}", s))
    }
}

/// Lifecycle of a single node run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Queued,
    Running,
    Completed,
    Error,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Completed | NodeStatus::Error)
    }

    /// Forward-only transitions of the node state machine
    fn can_transition_to(&self, to: NodeStatus) -> bool {
        use NodeStatus::*;
        matches!(
            (self, to),
            (Idle, Queued)
                | (Queued, Running)
                | (Running, Completed)
                | (Running, Error)
                | (Queued, Error)
                | (Idle, Error)
        )
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Idle => "idle",
            NodeStatus::Queued => "queued",
            NodeStatus::Running => "running",
            NodeStatus::Completed => "completed",
            NodeStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// One computational-biology job within a pipeline
///
/// Run state (status, result, error, progress) is only changed by the
/// pipeline store through the crate-private transition methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineNode {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    pub label: String,

    /// Parameters specific to `node_type`
    #[serde(default)]
    pub config: Map<String, Value>,

    #[serde(default)]
    status: NodeStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    result_metadata: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,

    /// Remote job backing the current run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    job_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    progress: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    progress_message: Option<String>,
}

impl PipelineNode {
    pub fn new(id: impl Into<String>, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            label: label.into(),
            config: Map::new(),
            status: NodeStatus::Idle,
            result_metadata: None,
            error: None,
            job_id: None,
            progress: None,
            progress_message: None,
        }
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn result_metadata(&self) -> Option<&Value> {
        self.result_metadata.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub fn progress_message(&self) -> Option<&str> {
        self.progress_message.as_deref()
    }

    fn transition(&mut self, to: NodeStatus) -> Result<(), PipelineError> {
        if !self.status.can_transition_to(to) {
            return Err(PipelineError::InvalidTransition {
                node: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub(crate) fn mark_queued(&mut self) -> Result<(), PipelineError> {
        self.transition(NodeStatus::Queued)
    }

    pub(crate) fn mark_running(&mut self, job_id: Option<String>) -> Result<(), PipelineError> {
        self.transition(NodeStatus::Running)?;
        self.job_id = job_id;
        Ok(())
    }

    /// Fold a non-terminal status update into the node
    pub(crate) fn record_progress(&mut self, progress: Option<u8>, message: Option<String>) {
        if self.status != NodeStatus::Running {
            return;
        }
        if let Some(p) = progress {
            self.progress = Some(p.min(100));
        }
        if message.is_some() {
            self.progress_message = message;
        }
    }

    pub(crate) fn mark_completed(&mut self, result: Option<Value>) -> Result<(), PipelineError> {
        self.transition(NodeStatus::Completed)?;
        self.result_metadata = result;
        self.progress = Some(100);
        Ok(())
    }

    pub(crate) fn mark_failed(&mut self, message: impl Into<String>) -> Result<(), PipelineError> {
        self.transition(NodeStatus::Error)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// Explicit user re-run: the only way out of `error`
    pub(crate) fn reset_for_rerun(&mut self) -> Result<(), PipelineError> {
        if self.status != NodeStatus::Error {
            return Err(PipelineError::NotRerunnable {
                node: self.id.clone(),
                status: self.status,
            });
        }
        self.status = NodeStatus::Idle;
        self.result_metadata = None;
        self.error = None;
        self.job_id = None;
        self.progress = None;
        self.progress_message = None;
        Ok(())
    }
}

/// Dependency edge: `target` runs after `source` completes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineEdge {
    pub source: String,
    pub target: String,
}

impl PipelineEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}
