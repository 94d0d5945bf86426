//! Wire types for remote job status

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Handle to a remote job returned by a submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,

    /// Service the job was submitted to, used to build status/cancel URLs
    pub service: String,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.job_id)
    }
}

/// Remote job state as reported by a status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Error,
    Cancelled,
    /// Not yet visible to the job store; not a failure
    NotFound,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Error | JobState::Cancelled)
    }
}

/// Transient view of one remote job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub job_id: String,

    pub status: JobState,

    /// Percent complete, 0-100
    #[serde(default)]
    pub progress: Option<f64>,

    #[serde(default)]
    pub progress_message: Option<String>,

    /// Result payload, present on completion
    #[serde(default)]
    pub data: Option<Value>,

    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatus {
    pub fn new(job_id: impl Into<String>, status: JobState) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            progress: None,
            progress_message: None,
            data: None,
            error: None,
        }
    }

    pub fn with_progress(mut self, progress: f64, message: impl Into<String>) -> Self {
        self.progress = Some(progress);
        self.progress_message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Progress clamped to a whole percentage
    pub fn percent(&self) -> Option<u8> {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0).round() as u8)
    }
}

/// Frame type tag on the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Status,
    Progress,
    Completed,
    Error,
}

/// One frame received on a job's push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusFrame {
    #[serde(rename = "type")]
    pub kind: FrameKind,

    #[serde(default)]
    pub status: Option<JobState>,

    #[serde(default)]
    pub progress: Option<f64>,

    #[serde(default)]
    pub progress_message: Option<String>,

    #[serde(default)]
    pub data: Option<Value>,

    #[serde(default)]
    pub error: Option<String>,
}

impl StatusFrame {
    pub fn from_status(kind: FrameKind, status: JobStatus) -> Self {
        Self {
            kind,
            status: Some(status.status),
            progress: status.progress,
            progress_message: status.progress_message,
            data: status.data,
            error: status.error,
        }
    }

    /// Fold the frame into a status; terminal frame tags win over the payload
    pub fn into_status(self, job_id: &str) -> JobStatus {
        let state = match (self.kind, self.status) {
            (FrameKind::Completed, _) => JobState::Completed,
            (FrameKind::Error, Some(JobState::Cancelled)) => JobState::Cancelled,
            (FrameKind::Error, _) => JobState::Error,
            (_, Some(state)) => state,
            (_, None) => JobState::Running,
        };

        JobStatus {
            job_id: job_id.to_string(),
            status: state,
            progress: self.progress,
            progress_message: self.progress_message,
            data: self.data,
            error: self.error,
        }
    }
}
