//! HTTP persistence backend
//!
//! - `POST /pipelines` - create or update, returns `{ "id": ... }`
//! - `GET /pipelines/{id}` - full record
//! - `GET /pipelines?conversation_id=&full=` - records, possibly summaries
//! - `DELETE /pipelines/{id}` - or `POST` with `X-HTTP-Method-Override: DELETE`

use crate::core::Pipeline;
use crate::persistence::{ListFilters, PersistenceAdapter, PersistenceError, PipelineRecord, SaveOptions};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

#[derive(Debug, Deserialize)]
struct SaveResponse {
    #[serde(default, alias = "_id")]
    id: Option<String>,
}

/// Client for a remote pipeline store
#[derive(Debug, Clone)]
pub struct HttpPersistence {
    base_url: String,
    client: Client,

    /// Send deletes as POST with a method override header
    method_override: bool,
}

impl HttpPersistence {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            method_override: false,
        }
    }

    pub fn with_method_override(mut self, enabled: bool) -> Self {
        self.method_override = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the status code and return the JSON body
    async fn handle_response(&self, id: Option<&str>, response: reqwest::Response) -> Result<Value, PersistenceError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PersistenceError::NotFound(id.unwrap_or("pipelines").to_string()));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PersistenceError::Backend(format!("{} ({})", error_text, status.as_u16())));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        Ok(response.json().await?)
    }
}

/// Unwrap `{ "<key>": ... }` envelopes some servers put around bodies
fn unwrap_envelope(value: Value, key: &str) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key(key) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[async_trait]
impl PersistenceAdapter for HttpPersistence {
    async fn save(&self, pipeline: &Pipeline, options: &SaveOptions) -> Result<String, PersistenceError> {
        let url = format!("{}/pipelines", self.base_url);
        let record = PipelineRecord::from_pipeline(pipeline, options.conversation_id.clone());
        let response = self.client.post(&url).json(&record).send().await?;

        let body = self.handle_response(Some(&pipeline.id), response).await?;
        let saved: SaveResponse = serde_json::from_value(body).unwrap_or(SaveResponse { id: None });
        debug!("Saved pipeline {} to {}", pipeline.id, self.base_url);
        Ok(saved.id.unwrap_or_else(|| pipeline.id.clone()))
    }

    async fn load(&self, id: &str) -> Result<Pipeline, PersistenceError> {
        let url = format!("{}/pipelines/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        let body = self.handle_response(Some(id), response).await?;
        PipelineRecord::from_value(unwrap_envelope(body, "pipeline"))?.into_pipeline()
    }

    async fn list(&self, filters: &ListFilters) -> Result<Vec<PipelineRecord>, PersistenceError> {
        let url = format!("{}/pipelines", self.base_url);
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(conversation) = &filters.conversation_id {
            query.push(("conversation_id", conversation.clone()));
        }
        query.push(("full", filters.full.to_string()));
        let response = self.client.get(&url).query(&query).send().await?;

        let body = unwrap_envelope(self.handle_response(None, response).await?, "pipelines");
        match body {
            Value::Array(items) => items.into_iter().map(PipelineRecord::from_value).collect(),
            Value::Null => Ok(vec![]),
            other => Err(PersistenceError::Backend(format!(
                "Expected a list of pipelines, got {}",
                other
            ))),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let url = format!("{}/pipelines/{}", self.base_url, id);
        let request = if self.method_override {
            self.client.post(&url).header(METHOD_OVERRIDE_HEADER, "DELETE")
        } else {
            self.client.delete(&url)
        };
        let response = request.send().await?;

        self.handle_response(Some(id), response).await?;
        Ok(())
    }
}
