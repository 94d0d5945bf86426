//! Node execution adapters
//!
//! The pipeline store never talks to a compute service directly. Every node
//! goes through a [`NodeExecutor`] picked by its [`NodeType`], so adding a
//! node type or moving one to another backend only needs a new executor.

pub mod http;
pub mod input;
pub mod registry;

use crate::core::NodeType;
use crate::transport::{JobHandle, JobStatus, StatusFrame, StatusSource, TransportError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

pub use http::HttpNodeExecutor;
pub use input::InputExecutor;
pub use registry::ExecutorRegistry;

/// Error types for executor operations
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("No executor bound for node type {0}")]
    Unsupported(NodeType),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What a submission produced
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// A remote job is running; observe it through the handle
    Job(JobHandle),

    /// The node finished during submission (e.g. input nodes)
    Ready(Option<Value>),
}

/// Trait for node execution - one implementation per backend
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Submit a node run; may return before the remote job finishes
    async fn execute(
        &self,
        node_type: NodeType,
        config: &Map<String, Value>,
        input: &Value,
        session_id: &str,
    ) -> Result<Submission, ExecutorError>;

    /// Pull the current status of a job
    async fn check_status(&self, _job: &JobHandle) -> Result<JobStatus, TransportError> {
        Err(TransportError::Unsupported)
    }

    /// Open the job's push channel, if the backend has one
    async fn subscribe(&self, _job: &JobHandle) -> Result<mpsc::Receiver<StatusFrame>, TransportError> {
        Err(TransportError::PushUnavailable("executor has no push channel".to_string()))
    }

    /// Best-effort cancellation of a running job
    async fn cancel(&self, _job: &JobHandle) -> Result<(), ExecutorError> {
        Ok(())
    }
}

/// Lets a job status transport observe jobs through their executor
pub struct ExecutorStatusSource {
    executor: Arc<dyn NodeExecutor>,
}

impl ExecutorStatusSource {
    pub fn new(executor: Arc<dyn NodeExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl StatusSource for ExecutorStatusSource {
    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, TransportError> {
        self.executor.check_status(job).await
    }

    async fn subscribe(&self, job: &JobHandle) -> Result<mpsc::Receiver<StatusFrame>, TransportError> {
        self.executor.subscribe(job).await
    }
}
