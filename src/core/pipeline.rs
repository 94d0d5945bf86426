//! Pipeline domain model

use crate::core::{
    error::ValidationError,
    node::{NodeStatus, PipelineEdge, PipelineNode},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use uuid::Uuid;

/// Overall pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Created but never run to completion
    #[default]
    Draft,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStatus::Draft => "draft",
            PipelineStatus::Running => "running",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A directed acyclic graph of pipeline nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PipelineParts")]
pub struct Pipeline {
    pub id: String,

    pub name: String,

    nodes: Vec<PipelineNode>,

    edges: Vec<PipelineEdge>,

    #[serde(default)]
    status: PipelineStatus,

    pub created_at: DateTime<Utc>,

    updated_at: DateTime<Utc>,
}

/// Serialized form of a pipeline, validated on the way in
#[derive(Deserialize)]
struct PipelineParts {
    id: String,
    name: String,
    nodes: Vec<PipelineNode>,
    edges: Vec<PipelineEdge>,
    #[serde(default)]
    status: PipelineStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PipelineParts> for Pipeline {
    type Error = ValidationError;

    fn try_from(parts: PipelineParts) -> Result<Self, Self::Error> {
        Pipeline::from_parts(
            parts.id,
            parts.name,
            parts.nodes,
            parts.edges,
            parts.status,
            parts.created_at,
            parts.updated_at,
        )
    }
}

impl Pipeline {
    /// Create a draft pipeline with a fresh id, rejecting invalid graphs
    pub fn new(
        name: impl Into<String>,
        nodes: Vec<PipelineNode>,
        edges: Vec<PipelineEdge>,
    ) -> Result<Self, ValidationError> {
        validate_graph(&nodes, &edges)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            nodes,
            edges,
            status: PipelineStatus::Draft,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a pipeline from stored parts (used by persistence backends)
    pub fn from_parts(
        id: String,
        name: String,
        nodes: Vec<PipelineNode>,
        edges: Vec<PipelineEdge>,
        status: PipelineStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        validate_graph(&nodes, &edges)?;
        Ok(Self {
            id,
            name,
            nodes,
            edges,
            status,
            created_at,
            updated_at,
        })
    }

    pub fn nodes(&self) -> &[PipelineNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[PipelineEdge] {
        &self.edges
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Get a node by ID
    pub fn node(&self, id: &str) -> Option<&PipelineNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut PipelineNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub(crate) fn set_status(&mut self, status: PipelineStatus) {
        self.status = status;
        self.touch();
    }

    /// Bump `updated_at`; called on every local mutation
    pub(crate) fn touch(&mut self) {
        let now = Utc::now();
        // Keep the timestamp strictly increasing even on coarse clocks.
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + chrono::Duration::microseconds(1)
        };
    }

    /// IDs of the nodes `id` depends on
    pub fn dependencies(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.target == id)
            .map(|e| e.source.as_str())
            .collect()
    }

    /// IDs of the nodes that depend directly on `id`
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.source == id)
            .map(|e| e.target.as_str())
            .collect()
    }

    /// Nodes that are idle and whose dependencies have all completed
    pub fn ready_nodes(&self) -> Vec<&PipelineNode> {
        let completed: HashSet<&str> = self
            .nodes
            .iter()
            .filter(|n| n.status() == NodeStatus::Completed)
            .map(|n| n.id.as_str())
            .collect();

        self.nodes
            .iter()
            .filter(|n| {
                n.status() == NodeStatus::Idle
                    && self
                        .dependencies(&n.id)
                        .iter()
                        .all(|dep| completed.contains(dep))
            })
            .collect()
    }

    /// Nodes currently queued or running
    pub fn in_flight_nodes(&self) -> Vec<&PipelineNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.status(), NodeStatus::Queued | NodeStatus::Running))
            .collect()
    }

    /// All non-terminal nodes reachable downstream of `id`, in BFS order
    pub fn pending_descendants(&self, id: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = self.dependents(id).into_iter().collect();
        let mut result = Vec::new();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(node) = self.node(next) {
                if !node.status().is_terminal() {
                    result.push(next.to_string());
                }
            }
            queue.extend(self.dependents(next));
        }

        result
    }

    /// Every node reachable downstream of `id`, in BFS order
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = self.dependents(id).into_iter().collect();
        let mut result = Vec::new();

        while let Some(next) = queue.pop_front() {
            if seen.insert(next) {
                result.push(next.to_string());
                queue.extend(self.dependents(next));
            }
        }

        result
    }

    /// True when every node is completed or errored
    pub fn is_settled(&self) -> bool {
        self.nodes.iter().all(|n| n.status().is_terminal())
    }

    /// True when at least one node ended in error
    pub fn has_errors(&self) -> bool {
        self.nodes.iter().any(|n| n.status() == NodeStatus::Error)
    }

    /// Execution order (topological sort)
    pub fn execution_order(&self) -> Vec<String> {
        // Graphs are validated on construction, so a cycle here is unreachable.
        topological_sort(&self.nodes, &self.edges).unwrap_or_default()
    }
}

/// Check node id uniqueness, edge endpoints and acyclicity
pub fn validate_graph(nodes: &[PipelineNode], edges: &[PipelineEdge]) -> Result<(), ValidationError> {
    let mut ids = HashSet::new();
    for node in nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateNode(node.id.clone()));
        }
    }

    for edge in edges {
        for endpoint in [&edge.source, &edge.target] {
            if !ids.contains(endpoint.as_str()) {
                return Err(ValidationError::UnknownEdgeEndpoint {
                    upstream: edge.source.clone(),
                    downstream: edge.target.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        if edge.source == edge.target {
            return Err(ValidationError::SelfLoop(edge.source.clone()));
        }
    }

    topological_sort(nodes, edges).map(|_| ())
}

/// Kahn's algorithm; ties broken by node declaration order
pub fn topological_sort(
    nodes: &[PipelineNode],
    edges: &[PipelineEdge],
) -> Result<Vec<String>, ValidationError> {
    let position: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; nodes.len()];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut seen_edges = HashSet::new();
    for edge in edges {
        let (Some(&s), Some(&t)) = (position.get(edge.source.as_str()), position.get(edge.target.as_str())) else {
            continue;
        };
        if seen_edges.insert((s, t)) {
            outgoing[s].push(t);
            in_degree[t] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut result = Vec::with_capacity(nodes.len());

    while let Some(i) = ready.pop_first() {
        result.push(nodes[i].id.clone());
        for &t in &outgoing[i] {
            in_degree[t] -= 1;
            if in_degree[t] == 0 {
                ready.insert(t);
            }
        }
    }

    if result.len() < nodes.len() {
        return Err(ValidationError::Cycle(find_cycle(nodes, &outgoing)));
    }

    Ok(result)
}

/// Depth-first search for one cycle, returned as a closed path
fn find_cycle(nodes: &[PipelineNode], outgoing: &[Vec<usize>]) -> Vec<String> {
    fn visit(
        i: usize,
        outgoing: &[Vec<usize>],
        visited: &mut HashSet<usize>,
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        if let Some(start) = stack.iter().position(|&s| s == i) {
            let mut cycle = stack[start..].to_vec();
            cycle.push(i);
            return Some(cycle);
        }
        if !visited.insert(i) {
            return None;
        }
        stack.push(i);
        for &next in &outgoing[i] {
            if let Some(cycle) = visit(next, outgoing, visited, stack) {
                return Some(cycle);
            }
        }
        stack.pop();
        None
    }

    let mut visited = HashSet::new();
    for i in 0..nodes.len() {
        let mut stack = Vec::new();
        if let Some(cycle) = visit(i, outgoing, &mut visited, &mut stack) {
            return cycle.into_iter().map(|c| nodes[c].id.clone()).collect();
        }
    }
    Vec::new()
}
