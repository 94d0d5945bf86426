//! Binding of node types to executors

use crate::adapter::{InputExecutor, NodeExecutor};
use crate::core::NodeType;
use std::sync::Arc;

/// One executor per node type; dispatch is an exhaustive match
#[derive(Clone)]
pub struct ExecutorRegistry {
    input: Arc<dyn NodeExecutor>,
    backbone_design: Arc<dyn NodeExecutor>,
    sequence_design: Arc<dyn NodeExecutor>,
    structure_prediction: Arc<dyn NodeExecutor>,
    docking: Arc<dyn NodeExecutor>,
}

impl ExecutorRegistry {
    /// Local input executor plus one executor for every remote type
    pub fn uniform(remote: Arc<dyn NodeExecutor>) -> Self {
        Self {
            input: Arc::new(InputExecutor),
            backbone_design: remote.clone(),
            sequence_design: remote.clone(),
            structure_prediction: remote.clone(),
            docking: remote,
        }
    }

    /// Rebind a single node type
    pub fn with(mut self, node_type: NodeType, executor: Arc<dyn NodeExecutor>) -> Self {
        *self.slot_mut(node_type) = executor;
        self
    }

    pub fn get(&self, node_type: NodeType) -> Arc<dyn NodeExecutor> {
        match node_type {
            NodeType::Input => self.input.clone(),
            NodeType::BackboneDesign => self.backbone_design.clone(),
            NodeType::SequenceDesign => self.sequence_design.clone(),
            NodeType::StructurePrediction => self.structure_prediction.clone(),
            NodeType::Docking => self.docking.clone(),
        }
    }

    fn slot_mut(&mut self, node_type: NodeType) -> &mut Arc<dyn NodeExecutor> {
        match node_type {
            NodeType::Input => &mut self.input,
            NodeType::BackboneDesign => &mut self.backbone_design,
            NodeType::SequenceDesign => &mut self.sequence_design,
            NodeType::StructurePrediction => &mut self.structure_prediction,
            NodeType::Docking => &mut self.docking,
        }
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry").finish_non_exhaustive()
    }
}
