//! Executor that submits nodes to HTTP compute services

use crate::adapter::{ExecutorError, NodeExecutor, Submission};
use crate::core::{config::ServicesConfig, NodeType};
use crate::transport::http::{HttpJobClient, SubmitRequest};
use crate::transport::{JobHandle, JobStatus, StatusFrame, TransportError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Maps node types to services and submits through [`HttpJobClient`]
#[derive(Debug, Clone)]
pub struct HttpNodeExecutor {
    client: Arc<HttpJobClient>,
    services: ServicesConfig,
}

impl HttpNodeExecutor {
    pub fn new(services: ServicesConfig) -> Result<Self, TransportError> {
        let client = HttpJobClient::new(&services.base_url, services.timeout_secs)?;
        Ok(Self::with_client(Arc::new(client), services))
    }

    pub fn with_client(client: Arc<HttpJobClient>, services: ServicesConfig) -> Self {
        Self { client, services }
    }
}

#[async_trait]
impl NodeExecutor for HttpNodeExecutor {
    async fn execute(
        &self,
        node_type: NodeType,
        config: &Map<String, Value>,
        input: &Value,
        session_id: &str,
    ) -> Result<Submission, ExecutorError> {
        let service = self
            .services
            .service_for(node_type)
            .ok_or(ExecutorError::Unsupported(node_type))?;

        let request = SubmitRequest {
            params: config,
            input,
            session_id,
        };
        let handle = self.client.submit(&service, &request).await.map_err(|e| match e {
            TransportError::Status { status, body } if (400..500).contains(&status) => {
                ExecutorError::Rejected(format!("{} ({})", body, status))
            }
            other => ExecutorError::Transport(other),
        })?;

        info!("Submitted {} node as job {}", node_type, handle);
        Ok(Submission::Job(handle))
    }

    async fn check_status(&self, job: &JobHandle) -> Result<JobStatus, TransportError> {
        self.client.fetch_status(job).await
    }

    async fn subscribe(&self, job: &JobHandle) -> Result<mpsc::Receiver<StatusFrame>, TransportError> {
        self.client.open_stream(job).await
    }

    async fn cancel(&self, job: &JobHandle) -> Result<(), ExecutorError> {
        if let Err(e) = self.client.cancel(job).await {
            warn!("Cancel request for {} failed: {}", job, e);
            return Err(e.into());
        }
        Ok(())
    }
}
