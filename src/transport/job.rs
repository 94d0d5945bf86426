//! Per-job supervisor that selects between push frames and pull ticks

use crate::transport::{
    JobHandle, JobState, JobStatus, StatusFrame, StatusSource, TransportConfig, TransportEvent,
    TransportEventKind, TransportFailure,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

/// Observes one remote job until it reaches a terminal state
///
/// Dropping the transport stops it.
#[derive(Debug)]
pub struct JobStatusTransport {
    job: JobHandle,
    task: JoinHandle<()>,
}

impl JobStatusTransport {
    /// Spawn the supervisor; events for `job` are sent to `sink`
    pub fn start(
        job: JobHandle,
        source: Arc<dyn StatusSource>,
        config: TransportConfig,
        sink: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        debug!("Starting status transport for {}", job);
        let task = tokio::spawn(supervise(job.clone(), source, config, sink));
        Self { job, task }
    }

    pub fn job(&self) -> &JobHandle {
        &self.job
    }

    /// True once a terminal event was sent or the transport was stopped
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the pending pull timer and close the push channel; idempotent
    pub fn stop(&self) {
        if !self.task.is_finished() {
            debug!("Stopping status transport for {}", self.job);
        }
        self.task.abort();
    }
}

impl Drop for JobStatusTransport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Tick {
    Status(JobStatus),
    PushClosed,
    PollFailed,
    BudgetExceeded,
}

async fn next_frame(push: &mut Option<mpsc::Receiver<StatusFrame>>) -> Option<StatusFrame> {
    match push {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn supervise(
    job: JobHandle,
    source: Arc<dyn StatusSource>,
    config: TransportConfig,
    sink: mpsc::UnboundedSender<TransportEvent>,
) {
    let started = Instant::now();
    let deadline = started + config.budget;

    let mut push = if config.prefer_push {
        match timeout_at(deadline, source.subscribe(&job)).await {
            Ok(Ok(rx)) => {
                debug!("Push channel open for {}", job);
                Some(rx)
            }
            Ok(Err(e)) => {
                debug!("Push channel for {} unavailable, polling instead: {}", job, e);
                None
            }
            Err(_) => None,
        }
    } else {
        None
    };

    // First pull goes out as soon as we are polling.
    let mut next_poll = Instant::now();

    loop {
        let tick = tokio::select! {
            biased;
            _ = sleep_until(deadline) => Tick::BudgetExceeded,
            frame = next_frame(&mut push), if push.is_some() => match frame {
                Some(frame) => Tick::Status(frame.into_status(&job.job_id)),
                None => Tick::PushClosed,
            },
            _ = sleep_until(next_poll), if push.is_none() => {
                let result = timeout_at(deadline, source.poll(&job)).await;
                next_poll = Instant::now() + config.schedule.interval_for(started.elapsed());
                match result {
                    Ok(Ok(status)) => Tick::Status(status),
                    Ok(Err(e)) => {
                        debug!("Status poll for {} failed, retrying: {}", job, e);
                        Tick::PollFailed
                    }
                    Err(_) => Tick::PollFailed,
                }
            }
        };

        let kind = match tick {
            Tick::PollFailed => continue,
            Tick::PushClosed => {
                warn!("Push channel for {} closed, falling back to polling", job);
                push = None;
                next_poll = Instant::now();
                continue;
            }
            Tick::BudgetExceeded => {
                warn!("Gave up observing {} after {}s", job, config.budget.as_secs());
                TransportEventKind::Failed(TransportFailure::BudgetExceeded(config.budget))
            }
            Tick::Status(mut status) => {
                if status.job_id.is_empty() {
                    status.job_id = job.job_id.clone();
                }
                match status.status {
                    JobState::Completed => {
                        info!("Job {} completed", job);
                        TransportEventKind::Completed(status)
                    }
                    JobState::Error => {
                        let message = status
                            .error
                            .unwrap_or_else(|| "Remote job failed".to_string());
                        info!("Job {} failed: {}", job, message);
                        TransportEventKind::Failed(TransportFailure::Remote(message))
                    }
                    JobState::Cancelled => {
                        info!("Job {} was cancelled remotely", job);
                        TransportEventKind::Failed(TransportFailure::Cancelled)
                    }
                    JobState::Queued | JobState::Running | JobState::NotFound => {
                        TransportEventKind::Update(status)
                    }
                }
            }
        };

        let terminal = kind.is_terminal();
        let event = TransportEvent {
            job_id: job.job_id.clone(),
            kind,
        };
        if sink.send(event).is_err() || terminal {
            return;
        }
    }
}
