//! Error types for pipeline validation and orchestration

use crate::core::node::NodeStatus;
use thiserror::Error;

/// A blueprint or pipeline was rejected before any node was queued
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Duplicate node ID: {0}")]
    DuplicateNode(String),

    #[error("Edge {upstream} -> {downstream} references unknown node '{missing}'")]
    UnknownEdgeEndpoint {
        upstream: String,
        downstream: String,
        missing: String,
    },

    #[error("Node '{0}' depends on itself")]
    SelfLoop(String),

    #[error("Edges form a cycle through: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("No nodes selected")]
    EmptySelection,

    #[error("Selected node '{0}' is not part of the blueprint")]
    UnknownSelection(String),

    #[error("Node '{node}' is missing required config key '{key}'")]
    MissingConfig { node: String, key: String },

    #[error("Node '{0}' has an empty config")]
    EmptyConfig(String),

    #[error("Blueprint was already {0}")]
    AlreadyDecided(&'static str),
}

/// Errors raised by the pipeline graph store
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Node '{0}' not found")]
    UnknownNode(String),

    #[error("Node '{node}' cannot move from {from} to {to}")]
    InvalidTransition {
        node: String,
        from: NodeStatus,
        to: NodeStatus,
    },

    #[error("Pipeline '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Node '{node}' is {status}; only failed nodes can be re-run")]
    NotRerunnable { node: String, status: NodeStatus },
}
