//! Job status transport
//!
//! One [`JobStatusTransport`] observes one remote job. It prefers the job's
//! push channel and falls back to scheduled pull requests whenever the
//! channel cannot be opened or drops. Transient failures are retried on the
//! next tick; only a terminal job status or the wall-clock budget ends it.
//!
//! Events are delivered on a channel rather than through callbacks:
//!
//! ```no_run
//! use biopipe::transport::{JobHandle, JobStatusTransport, TransportConfig, TransportEventKind};
//! use biopipe::transport::http::HttpJobClient;
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(HttpJobClient::new("http://localhost:8000", 30)?);
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let transport = JobStatusTransport::start(
//!     JobHandle::new("job-123", "alphafold"),
//!     client,
//!     TransportConfig::default(),
//!     tx,
//! );
//!
//! while let Some(event) = rx.recv().await {
//!     match event.kind {
//!         TransportEventKind::Update(status) => println!("{:?}", status.progress),
//!         TransportEventKind::Completed(status) => {
//!             println!("done: {:?}", status.data);
//!             break;
//!         }
//!         TransportEventKind::Failed(failure) => {
//!             println!("failed: {}", failure);
//!             break;
//!         }
//!     }
//! }
//! transport.stop();
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod job;
pub mod schedule;
pub mod status;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub use job::JobStatusTransport;
pub use schedule::{PollSchedule, PollTier};
pub use status::{FrameKind, JobHandle, JobState, JobStatus, StatusFrame};

/// Failures talking to a status channel; retried, never fatal on their own
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode status payload: {0}")]
    Decode(String),

    #[error("Push channel unavailable: {0}")]
    PushUnavailable(String),

    #[error("Status checks are not supported for this job")]
    Unsupported,
}

/// Terminal outcome of a job other than success
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    #[error("{0}")]
    Remote(String),

    #[error("Job was cancelled by the service")]
    Cancelled,

    #[error("No result after {}s; the job may still finish", .0.as_secs())]
    BudgetExceeded(Duration),
}

impl TransportFailure {
    /// The job might still finish remotely; only the observation gave up
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, TransportFailure::BudgetExceeded(_))
    }
}

/// Something the transport observed about a job
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub job_id: String,
    pub kind: TransportEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    /// Non-terminal status (queued, running, not_found)
    Update(JobStatus),
    Completed(JobStatus),
    Failed(TransportFailure),
}

impl TransportEventKind {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransportEventKind::Update(_))
    }
}

/// How a transport observes its job
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub schedule: PollSchedule,

    /// Give up observing after this much wall time
    pub budget: Duration,

    /// Try the push channel before polling
    pub prefer_push: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            schedule: PollSchedule::default(),
            budget: Duration::from_secs(7200),
            prefer_push: true,
        }
    }
}

/// A producer of job status: pull on request, optionally push
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the current status once
    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, TransportError>;

    /// Open the job's push channel; the channel closing means it dropped
    async fn subscribe(&self, _job: &JobHandle) -> Result<mpsc::Receiver<StatusFrame>, TransportError> {
        Err(TransportError::PushUnavailable("no push channel".to_string()))
    }
}
