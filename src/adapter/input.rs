//! Input nodes carry user data and complete without a remote job

use crate::adapter::{ExecutorError, NodeExecutor, Submission};
use crate::core::NodeType;
use async_trait::async_trait;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct InputExecutor;

#[async_trait]
impl NodeExecutor for InputExecutor {
    async fn execute(
        &self,
        node_type: NodeType,
        config: &Map<String, Value>,
        _input: &Value,
        _session_id: &str,
    ) -> Result<Submission, ExecutorError> {
        if node_type != NodeType::Input {
            return Err(ExecutorError::Unsupported(node_type));
        }
        Ok(Submission::Ready(Some(Value::Object(config.clone()))))
    }
}
