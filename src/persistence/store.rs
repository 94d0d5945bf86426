//! SQLite-based persistence store

use crate::core::{Pipeline, PipelineEdge, PipelineNode, PipelineStatus};
use crate::persistence::record::parse_date_str;
use crate::persistence::{ListFilters, PersistenceAdapter, PersistenceError, PipelineRecord, SaveOptions};
use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;

/// Graph part of a pipeline, stored as one JSON column
#[derive(Serialize, Deserialize)]
struct GraphBody {
    nodes: Vec<PipelineNode>,
    edges: Vec<PipelineEdge>,
}

/// SQLite pipeline store
pub struct SqlitePipelineStore {
    pool: SqlitePool,
}

impl SqlitePipelineStore {
    /// Create a new SQLite store
    pub async fn new(db_path: &str) -> Result<Self, PersistenceError> {
        let url = if db_path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", db_path)
        };
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            // An in-memory database lives and dies with its single connection
            .max_connections(if db_path == ":memory:" { 1 } else { 4 })
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Default database location under the user's data directory
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        let db_dir = data_dir.join("biopipe");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create data directory {}", db_dir.display()))?;
        Ok(db_dir.join("pipelines.db"))
    }

    /// Create store with default path
    pub async fn with_default_path() -> anyhow::Result<Self> {
        let db_path = Self::default_path()?;
        let db_path = db_path
            .to_str()
            .context("Data directory path is not valid UTF-8")?
            .to_string();
        Ok(Self::new(&db_path).await?)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pipelines (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                conversation_id TEXT,
                graph TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversation ON pipelines(conversation_id);
            CREATE INDEX IF NOT EXISTS idx_updated_at ON pipelines(updated_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    fn status_from_str(s: &str) -> PipelineStatus {
        match s {
            "running" => PipelineStatus::Running,
            "completed" => PipelineStatus::Completed,
            "failed" => PipelineStatus::Failed,
            _ => PipelineStatus::Draft,
        }
    }

    fn record_from_row(row: &SqliteRow, full: bool) -> Result<PipelineRecord, PersistenceError> {
        let (nodes, edges) = if full {
            let graph: GraphBody = serde_json::from_str(&row.get::<String, _>("graph"))?;
            (Some(graph.nodes), Some(graph.edges))
        } else {
            (None, None)
        };

        Ok(PipelineRecord {
            id: row.get("id"),
            name: row.get("name"),
            nodes,
            edges,
            status: Self::status_from_str(&row.get::<String, _>("status")),
            created_at: parse_date_str(&row.get::<String, _>("created_at"))?,
            updated_at: parse_date_str(&row.get::<String, _>("updated_at"))?,
            conversation_id: row.get("conversation_id"),
        })
    }
}

#[async_trait::async_trait]
impl PersistenceAdapter for SqlitePipelineStore {
    async fn save(&self, pipeline: &Pipeline, options: &SaveOptions) -> Result<String, PersistenceError> {
        let graph = serde_json::to_string(&GraphBody {
            nodes: pipeline.nodes().to_vec(),
            edges: pipeline.edges().to_vec(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO pipelines (id, name, status, conversation_id, graph, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                conversation_id = COALESCE(excluded.conversation_id, pipelines.conversation_id),
                graph = excluded.graph,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&pipeline.id)
        .bind(&pipeline.name)
        .bind(pipeline.status().to_string())
        .bind(options.conversation_id.as_deref())
        .bind(graph)
        .bind(Self::to_naive(pipeline.created_at).format("%Y-%m-%d %H:%M:%S%.9f").to_string())
        .bind(Self::to_naive(pipeline.updated_at()).format("%Y-%m-%d %H:%M:%S%.9f").to_string())
        .execute(&self.pool)
        .await?;

        Ok(pipeline.id.clone())
    }

    async fn load(&self, id: &str) -> Result<Pipeline, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, status, conversation_id, graph, created_at, updated_at
            FROM pipelines
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::record_from_row(&row, true)?.into_pipeline(),
            None => Err(PersistenceError::NotFound(id.to_string())),
        }
    }

    async fn list(&self, filters: &ListFilters) -> Result<Vec<PipelineRecord>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, status, conversation_id, graph, created_at, updated_at
            FROM pipelines
            WHERE ?1 IS NULL OR conversation_id = ?1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(filters.conversation_id.as_deref())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Self::record_from_row(row, filters.full))
            .collect()
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let result = sqlx::query("DELETE FROM pipelines WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
