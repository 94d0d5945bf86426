//! Wire and storage form of a pipeline
//!
//! Backends may hand back summaries without `nodes`/`edges`, and dates as
//! RFC 3339 strings, naive `YYYY-MM-DD HH:MM:SS` strings or epoch
//! milliseconds. Everything is normalized here, on ingestion.

use crate::core::{Pipeline, PipelineEdge, PipelineNode, PipelineStatus};
use crate::persistence::PersistenceError;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored pipeline, possibly without its graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRecord {
    pub id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<PipelineNode>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<PipelineEdge>>,

    pub status: PipelineStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Record as it arrives, before date normalization
#[derive(Debug, Deserialize)]
struct RawRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    nodes: Option<Vec<PipelineNode>>,
    #[serde(default)]
    edges: Option<Vec<PipelineEdge>>,
    #[serde(default)]
    status: PipelineStatus,
    #[serde(alias = "createdAt")]
    created_at: Value,
    #[serde(alias = "updatedAt")]
    updated_at: Value,
    #[serde(default, alias = "conversationId")]
    conversation_id: Option<String>,
}

impl PipelineRecord {
    pub fn from_pipeline(pipeline: &Pipeline, conversation_id: Option<String>) -> Self {
        Self {
            id: pipeline.id.clone(),
            name: pipeline.name.clone(),
            nodes: Some(pipeline.nodes().to_vec()),
            edges: Some(pipeline.edges().to_vec()),
            status: pipeline.status(),
            created_at: pipeline.created_at,
            updated_at: pipeline.updated_at(),
            conversation_id,
        }
    }

    /// Parse a record from JSON, normalizing its dates
    pub fn from_value(value: Value) -> Result<Self, PersistenceError> {
        let raw: RawRecord = serde_json::from_value(value)?;
        Ok(Self {
            created_at: normalize_date(&raw.created_at)?,
            updated_at: normalize_date(&raw.updated_at)?,
            id: raw.id,
            name: raw.name,
            nodes: raw.nodes,
            edges: raw.edges,
            status: raw.status,
            conversation_id: raw.conversation_id,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// A summary carries neither nodes nor edges
    pub fn is_summary(&self) -> bool {
        self.nodes.is_none() && self.edges.is_none()
    }

    /// Drop the graph, keeping only the listing fields
    pub fn to_summary(&self) -> Self {
        Self {
            nodes: None,
            edges: None,
            ..self.clone()
        }
    }

    /// Rebuild the pipeline; summaries must be loaded individually first
    pub fn into_pipeline(self) -> Result<Pipeline, PersistenceError> {
        if self.is_summary() {
            return Err(PersistenceError::Summary(self.id));
        }
        let id = self.id.clone();
        Pipeline::from_parts(
            self.id,
            self.name,
            self.nodes.unwrap_or_default(),
            self.edges.unwrap_or_default(),
            self.status,
            self.created_at,
            self.updated_at,
        )
        .map_err(|e| PersistenceError::Invalid {
            id,
            reason: e.to_string(),
        })
    }
}

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Normalize a date field into UTC
pub fn normalize_date(value: &Value) -> Result<DateTime<Utc>, PersistenceError> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| PersistenceError::InvalidDate(n.to_string())),
        other => Err(PersistenceError::InvalidDate(other.to_string())),
    }
}

/// Parse an RFC 3339 or naive UTC date string
pub fn parse_date_str(s: &str) -> Result<DateTime<Utc>, PersistenceError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| PersistenceError::InvalidDate(s.to_string()))
}
