//! Persistence layer for pipelines

pub mod http;
pub mod record;
pub mod sync;

#[cfg(feature = "sqlite")]
pub mod store;

pub use http::HttpPersistence;
pub use record::PipelineRecord;
pub use sync::PipelineCache;

#[cfg(feature = "sqlite")]
pub use store::SqlitePipelineStore;

use crate::core::Pipeline;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Error types for persistence operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Pipeline not found: {0}")]
    NotFound(String),

    #[error("Pipeline {0} is a summary record without nodes or edges")]
    Summary(String),

    #[error("Stored pipeline {id} is invalid: {reason}")]
    Invalid { id: String, reason: String },

    #[error("Invalid date value: {0}")]
    InvalidDate(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Options for a save
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Conversation the pipeline belongs to
    pub conversation_id: Option<String>,
}

/// Filters for a listing
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub conversation_id: Option<String>,

    /// Ask for complete records; backends may still return summaries
    pub full: bool,
}

/// Trait for persistence backends
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Save a pipeline, returning its id
    async fn save(&self, pipeline: &Pipeline, options: &SaveOptions) -> Result<String, PersistenceError>;

    /// Load a complete pipeline
    async fn load(&self, id: &str) -> Result<Pipeline, PersistenceError>;

    /// List pipelines; records may be summaries
    async fn list(&self, filters: &ListFilters) -> Result<Vec<PipelineRecord>, PersistenceError>;

    async fn delete(&self, id: &str) -> Result<(), PersistenceError>;
}

/// In-memory persistence (for testing or ephemeral use)
///
/// Listings without `full` return summaries, like the remote backend does.
#[derive(Default)]
pub struct InMemoryPersistence {
    records: RwLock<HashMap<String, PipelineRecord>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryPersistence {
    async fn save(&self, pipeline: &Pipeline, options: &SaveOptions) -> Result<String, PersistenceError> {
        let mut records = self.records.write().await;
        // Keep the conversation of an earlier save when none is given
        let conversation_id = options
            .conversation_id
            .clone()
            .or_else(|| records.get(&pipeline.id).and_then(|r| r.conversation_id.clone()));
        records.insert(
            pipeline.id.clone(),
            PipelineRecord::from_pipeline(pipeline, conversation_id),
        );
        Ok(pipeline.id.clone())
    }

    async fn load(&self, id: &str) -> Result<Pipeline, PersistenceError> {
        let records = self.records.read().await;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?
            .into_pipeline()
    }

    async fn list(&self, filters: &ListFilters) -> Result<Vec<PipelineRecord>, PersistenceError> {
        let records = self.records.read().await;
        let mut result: Vec<PipelineRecord> = records
            .values()
            .filter(|r| match &filters.conversation_id {
                Some(conversation) => r.conversation_id.as_ref() == Some(conversation),
                None => true,
            })
            .map(|r| if filters.full { r.clone() } else { r.to_summary() })
            .collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(result)
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }
}
