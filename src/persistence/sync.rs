//! Local pipeline cache reconciled against a persistence backend

use crate::core::Pipeline;
use crate::persistence::{ListFilters, PersistenceAdapter, PersistenceError, SaveOptions};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct CachedPipeline {
    pipeline: Pipeline,

    /// Local changes not yet saved
    dirty: bool,
}

/// What a sync did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Summaries that needed an individual load
    pub hydrated: Vec<String>,

    /// Pipelines taken from the backend
    pub updated: Vec<String>,

    /// Pipelines kept because the local copy has newer unsaved changes
    pub kept_local: Vec<String>,

    /// Records that could not be loaded
    pub skipped: Vec<String>,
}

/// Holds complete pipelines locally; never holds a summary
pub struct PipelineCache {
    adapter: Arc<dyn PersistenceAdapter>,
    entries: BTreeMap<String, CachedPipeline>,
}

impl PipelineCache {
    pub fn new(adapter: Arc<dyn PersistenceAdapter>) -> Self {
        Self {
            adapter,
            entries: BTreeMap::new(),
        }
    }

    pub fn adapter(&self) -> Arc<dyn PersistenceAdapter> {
        self.adapter.clone()
    }

    pub fn get(&self, id: &str) -> Option<&Pipeline> {
        self.entries.get(id).map(|e| &e.pipeline)
    }

    /// Held pipelines, most recently updated first
    pub fn pipelines(&self) -> Vec<&Pipeline> {
        let mut pipelines: Vec<&Pipeline> = self.entries.values().map(|e| &e.pipeline).collect();
        pipelines.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
        pipelines
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the local copy has unsaved changes
    pub fn is_dirty(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(|e| e.dirty)
    }

    /// Record a local edit without saving it
    pub fn insert_local(&mut self, pipeline: Pipeline) {
        self.entries.insert(
            pipeline.id.clone(),
            CachedPipeline {
                pipeline,
                dirty: true,
            },
        );
    }

    /// Save through the backend; on failure the local copy stays dirty
    pub async fn save(&mut self, pipeline: Pipeline, options: &SaveOptions) -> Result<String, PersistenceError> {
        let result = self.adapter.save(&pipeline, options).await;
        let id = pipeline.id.clone();
        let saved = result.is_ok();
        self.entries.insert(
            id.clone(),
            CachedPipeline {
                pipeline,
                dirty: !saved,
            },
        );

        match result {
            Ok(remote_id) => {
                if remote_id != id {
                    warn!("Backend stored pipeline {} under id {}", id, remote_id);
                }
                Ok(remote_id)
            }
            Err(e) => {
                warn!("Saving pipeline {} failed, keeping local copy: {}", id, e);
                Err(e)
            }
        }
    }

    /// Delete remotely, then locally
    pub async fn remove(&mut self, id: &str) -> Result<(), PersistenceError> {
        match self.adapter.delete(id).await {
            Ok(()) | Err(PersistenceError::NotFound(_)) => {
                self.entries.remove(id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Pull the backend's pipelines into the cache
    ///
    /// Summaries are hydrated with an individual load. A local copy with
    /// unsaved changes at least as recent as the remote one is kept.
    pub async fn sync(&mut self, filters: &ListFilters) -> Result<SyncReport, PersistenceError> {
        let records = self.adapter.list(filters).await?;
        let mut report = SyncReport::default();

        for record in records {
            let id = record.id.clone();

            if let Some(local) = self.entries.get(&id) {
                let local_updated = local.pipeline.updated_at();
                if local.dirty && local_updated >= record.updated_at {
                    debug!("Keeping local pipeline {} with unsaved changes", id);
                    report.kept_local.push(id);
                    continue;
                }
                if !local.dirty && local_updated == record.updated_at {
                    continue;
                }
            }

            let remote = if record.is_summary() {
                match self.adapter.load(&id).await {
                    Ok(pipeline) => {
                        report.hydrated.push(id.clone());
                        pipeline
                    }
                    Err(e) => {
                        warn!("Could not load pipeline {} during sync: {}", id, e);
                        report.skipped.push(id);
                        continue;
                    }
                }
            } else {
                match record.into_pipeline() {
                    Ok(pipeline) => pipeline,
                    Err(e) => {
                        warn!("Skipping invalid pipeline {} during sync: {}", id, e);
                        report.skipped.push(id);
                        continue;
                    }
                }
            };

            // The full record may be newer than the summary was
            if let Some(local) = self.entries.get(&id) {
                if local.dirty && local.pipeline.updated_at() >= remote.updated_at() {
                    report.kept_local.push(id);
                    continue;
                }
            }

            self.entries.insert(
                id.clone(),
                CachedPipeline {
                    pipeline: remote,
                    dirty: false,
                },
            );
            report.updated.push(id);
        }

        info!(
            "Synced pipelines: {} updated ({} hydrated), {} kept local, {} skipped",
            report.updated.len(),
            report.hydrated.len(),
            report.kept_local.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}
