//! HTTP client for compute job services
//!
//! Endpoints, relative to the configured base URL:
//! - `POST /{service}/submit` - submit a job, returns `{ "job_id": ... }`
//! - `GET /{service}/status/{job_id}` - pull the current status
//! - `GET /{service}/stream/{job_id}` - push channel, newline-delimited JSON frames
//! - `POST /{service}/cancel/{job_id}` - best-effort cancellation

use crate::transport::{JobHandle, JobState, JobStatus, StatusFrame, StatusSource, TransportError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Body of a job submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest<'a> {
    pub params: &'a serde_json::Map<String, Value>,
    pub input: &'a Value,
    pub session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Client for the job submission, status and cancel endpoints
#[derive(Debug, Clone)]
pub struct HttpJobClient {
    base_url: String,

    /// Client for request/response calls, with a request timeout
    client: Client,

    /// Client for long-lived push streams, connect timeout only
    stream_client: Client,
}

impl HttpJobClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self::with_clients(base_url, client, stream_client))
    }

    pub fn with_clients(base_url: impl Into<String>, client: Client, stream_client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            stream_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, service: &str, action: &str, job_id: Option<&str>) -> String {
        match job_id {
            Some(id) => format!("{}/{}/{}/{}", self.base_url, service, action, id),
            None => format!("{}/{}/{}", self.base_url, service, action),
        }
    }

    /// Submit a job and return its handle
    pub async fn submit(&self, service: &str, request: &SubmitRequest<'_>) -> Result<JobHandle, TransportError> {
        let url = self.url(service, "submit", None);
        let response = self.client.post(&url).json(request).send().await?;
        let response = ensure_success(response).await?;

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        debug!("Submitted job {} to {}", body.job_id, service);

        Ok(JobHandle::new(body.job_id, service))
    }

    /// Fetch the current status of a job
    pub async fn fetch_status(&self, job: &JobHandle) -> Result<JobStatus, TransportError> {
        let url = self.url(&job.service, "status", Some(&job.job_id));
        let response = self.client.get(&url).send().await?;

        // The job store may not know the job yet; that is "not visible", not a failure.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(JobStatus::new(&job.job_id, JobState::NotFound));
        }
        let response = ensure_success(response).await?;

        let mut status: JobStatus = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        if status.job_id.is_empty() {
            status.job_id = job.job_id.clone();
        }
        Ok(status)
    }

    /// Open the job's push stream and forward parsed frames
    pub async fn open_stream(&self, job: &JobHandle) -> Result<mpsc::Receiver<StatusFrame>, TransportError> {
        let url = self.url(&job.service, "stream", Some(&job.job_id));
        let response = self
            .stream_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .send()
            .await
            .map_err(|e| TransportError::PushUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::PushUnavailable(format!(
                "stream endpoint returned {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        let job = job.clone();
        tokio::spawn(async move {
            let mut response = response;
            let mut decoder = FrameDecoder::default();
            loop {
                let chunk = tokio::select! {
                    _ = tx.closed() => {
                        debug!("Push stream for {} dropped by the transport", job);
                        return;
                    }
                    chunk = response.chunk() => chunk,
                };
                let chunk = match chunk {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(e) => {
                        debug!("Push stream for {} errored: {}", job, e);
                        break;
                    }
                };

                for frame in decoder.push(&chunk) {
                    if tx.send(frame).await.is_err() {
                        return;
                    }
                }
            }

            if let Some(frame) = decoder.finish() {
                let _ = tx.send(frame).await;
            }
        });

        Ok(rx)
    }

    /// Ask the service to cancel a job; a 404 means it already finished
    pub async fn cancel(&self, job: &JobHandle) -> Result<(), TransportError> {
        let url = self.url(&job.service, "cancel", Some(&job.job_id));
        let response = self.client.post(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Cancel for {} returned 404; job already finished", job);
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }
}

/// Splits a push stream into frames
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across network chunks decode intact.
#[derive(Debug, Default)]
struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<StatusFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            frames.extend(decode_line(&line));
        }
        frames
    }

    /// A last frame the server sent without a trailing newline
    fn finish(&mut self) -> Option<StatusFrame> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }
}

fn decode_line(line: &[u8]) -> Option<StatusFrame> {
    match std::str::from_utf8(line) {
        Ok(line) => parse_frame(line),
        Err(e) => {
            warn!("Skipping status frame that is not valid UTF-8: {}", e);
            None
        }
    }
}

/// Parse one stream line; accepts bare JSON or SSE-style `data:` lines
pub fn parse_frame(line: &str) -> Option<StatusFrame> {
    let line = line.trim();
    let payload = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    if payload.is_empty() || payload.starts_with(':') {
        return None;
    }
    match serde_json::from_str(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("Skipping malformed status frame: {}", e);
            None
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl StatusSource for HttpJobClient {
    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, TransportError> {
        self.fetch_status(job).await
    }

    async fn subscribe(&self, job: &JobHandle) -> Result<mpsc::Receiver<StatusFrame>, TransportError> {
        self.open_stream(job).await
    }
}
