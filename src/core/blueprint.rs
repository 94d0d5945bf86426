//! Blueprint approval - turns a proposed candidate graph into a pipeline
//!
//! A [`PipelineBlueprint`] comes from the planner and is never executed
//! directly. The user picks a subset of its nodes (all of them by default),
//! may override per-node config, and approval produces a fresh `draft`
//! [`Pipeline`] whose edge set is guaranteed acyclic.

use crate::core::{
    error::ValidationError,
    node::{NodeType, PipelineEdge, PipelineNode},
    pipeline::Pipeline,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::info;

/// A node as proposed by the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintNode {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub config: Map<String, Value>,
}

/// An unapproved candidate pipeline graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    #[serde(default)]
    pub name: Option<String>,

    pub nodes: Vec<BlueprintNode>,

    #[serde(default)]
    pub edges: Vec<PipelineEdge>,

    /// Planner's explanation of the proposed graph
    #[serde(default)]
    pub rationale: String,

    /// Inputs the planner could not find (files, structures, ...)
    #[serde(default)]
    pub missing_resources: Vec<String>,
}

impl PipelineBlueprint {
    /// Load a blueprint from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read blueprint {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse a blueprint; YAML is a superset of JSON so both are accepted
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let blueprint: PipelineBlueprint =
            serde_yaml::from_str(content).context("Failed to parse blueprint")?;
        Ok(blueprint)
    }

    pub fn node(&self, id: &str) -> Option<&BlueprintNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Which proposed nodes the user accepted, plus config collected out of band
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// `None` selects every proposed node
    nodes: Option<BTreeSet<String>>,

    overrides: HashMap<String, Map<String, Value>>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: Some(ids.into_iter().map(Into::into).collect()),
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, node_id: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        self.overrides
            .entry(node_id.into())
            .or_default()
            .insert(key.into(), value);
        self
    }

    fn is_selected(&self, id: &str) -> bool {
        self.nodes.as_ref().map_or(true, |ids| ids.contains(id))
    }
}

/// Convert a blueprint plus selection into a draft pipeline
pub fn approve(
    blueprint: &PipelineBlueprint,
    selection: &Selection,
) -> Result<Pipeline, ValidationError> {
    let mut ids = HashSet::new();
    for node in &blueprint.nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateNode(node.id.clone()));
        }
    }

    if let Some(selected) = &selection.nodes {
        if selected.is_empty() {
            return Err(ValidationError::EmptySelection);
        }
        if let Some(unknown) = selected.iter().find(|id| !ids.contains(id.as_str())) {
            return Err(ValidationError::UnknownSelection(unknown.clone()));
        }
    } else if blueprint.nodes.is_empty() {
        return Err(ValidationError::EmptySelection);
    }

    // Edges naming nodes the planner never proposed make the blueprint malformed.
    for edge in &blueprint.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !ids.contains(endpoint.as_str()) {
                return Err(ValidationError::UnknownEdgeEndpoint {
                    upstream: edge.source.clone(),
                    downstream: edge.target.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
    }

    let nodes = blueprint
        .nodes
        .iter()
        .filter(|n| selection.is_selected(&n.id))
        .map(|n| build_node(n, selection.overrides.get(&n.id)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = HashSet::new();
    let edges: Vec<PipelineEdge> = blueprint
        .edges
        .iter()
        .filter(|e| selection.is_selected(&e.source) && selection.is_selected(&e.target))
        .filter(|e| seen.insert((e.source.clone(), e.target.clone())))
        .cloned()
        .collect();

    let dropped = blueprint.edges.len() - edges.len();
    let name = blueprint
        .name
        .clone()
        .unwrap_or_else(|| "Untitled pipeline".to_string());
    let pipeline = Pipeline::new(name, nodes, edges)?;

    info!(
        "Approved blueprint as pipeline {}: {} of {} nodes, {} edges dropped",
        pipeline.id,
        pipeline.nodes().len(),
        blueprint.nodes.len(),
        dropped
    );

    Ok(pipeline)
}

fn build_node(
    proposed: &BlueprintNode,
    overrides: Option<&Map<String, Value>>,
) -> Result<PipelineNode, ValidationError> {
    let mut config = proposed.config.clone();
    if let Some(overrides) = overrides {
        config.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    if proposed.node_type == NodeType::Input && config.is_empty() {
        return Err(ValidationError::EmptyConfig(proposed.id.clone()));
    }
    for key in proposed.node_type.required_config() {
        if config.get(*key).map_or(true, Value::is_null) {
            return Err(ValidationError::MissingConfig {
                node: proposed.id.clone(),
                key: key.to_string(),
            });
        }
    }

    let label = if proposed.label.trim().is_empty() {
        proposed.node_type.display_name().to_string()
    } else {
        proposed.label.clone()
    };

    Ok(PipelineNode::new(&proposed.id, proposed.node_type, label).with_config(config))
}

/// Where a blueprint stands in the review
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Approved { pipeline_id: String },
    Rejected,
}

/// A blueprint awaiting the user's decision
#[derive(Debug, Clone)]
pub struct BlueprintReview {
    blueprint: PipelineBlueprint,
    decision: Decision,
}

impl BlueprintReview {
    pub fn new(blueprint: PipelineBlueprint) -> Self {
        Self {
            blueprint,
            decision: Decision::Pending,
        }
    }

    pub fn blueprint(&self) -> &PipelineBlueprint {
        &self.blueprint
    }

    pub fn decision(&self) -> &Decision {
        &self.decision
    }

    /// Approve the selected nodes; a failed validation leaves the review pending
    pub fn approve(&mut self, selection: &Selection) -> Result<Pipeline, ValidationError> {
        match self.decision {
            Decision::Pending => {}
            Decision::Approved { .. } => return Err(ValidationError::AlreadyDecided("approved")),
            Decision::Rejected => return Err(ValidationError::AlreadyDecided("rejected")),
        }

        let pipeline = approve(&self.blueprint, selection)?;
        self.decision = Decision::Approved {
            pipeline_id: pipeline.id.clone(),
        };
        Ok(pipeline)
    }

    /// Decline the blueprint; repeated calls are no-ops
    pub fn reject(&mut self) -> Result<(), ValidationError> {
        match self.decision {
            Decision::Pending => {
                info!("Blueprint rejected");
                self.decision = Decision::Rejected;
                Ok(())
            }
            Decision::Rejected => Ok(()),
            Decision::Approved { .. } => Err(ValidationError::AlreadyDecided("approved")),
        }
    }
}
