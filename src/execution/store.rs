//! Pipeline graph store - the sole mutator of a pipeline's run state

use crate::adapter::{ExecutorError, ExecutorRegistry, ExecutorStatusSource, Submission};
use crate::core::{
    ExecutionLog, ExecutionLogEntry, NodeStatus, NodeType, Pipeline, PipelineError, PipelineNode,
    PipelineStatus, RunReport, RunState,
};
use crate::execution::{ExecutionScheduler, SchedulingStrategy};
use crate::persistence::{PersistenceAdapter, SaveOptions};
use crate::transport::{
    JobHandle, JobStatusTransport, TransportConfig, TransportEvent, TransportEventKind,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Error message set on nodes cancelled by the user
pub const CANCELLED_MESSAGE: &str = "Cancelled by user";

/// Events published while a pipeline runs
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    PipelineStarted {
        pipeline_id: String,
        name: String,
    },
    NodeQueued {
        node_id: String,
    },
    NodeStarted {
        node_id: String,
        job_id: Option<String>,
    },
    NodeProgress {
        node_id: String,
        progress: Option<u8>,
        message: Option<String>,
    },
    NodeCompleted {
        node_id: String,
        duration_ms: Option<i64>,
    },
    NodeFailed {
        node_id: String,
        error: String,
        budget_exceeded: bool,
    },
    NodeBlocked {
        node_id: String,
        blocked_by: String,
    },
    NodeCancelled {
        node_id: String,
    },
    PipelineFinished {
        pipeline_id: String,
        status: PipelineStatus,
    },
    SyncFailed {
        pipeline_id: String,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(StoreEvent) + Send + Sync>;

/// Run options for a store
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Forwarded to every executor call
    pub session_id: String,

    /// Attached to every save
    pub conversation_id: Option<String>,

    pub transport: TransportConfig,

    pub strategy: SchedulingStrategy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            conversation_id: None,
            transport: TransportConfig::default(),
            strategy: SchedulingStrategy::default(),
        }
    }
}

enum Command {
    Cancel(String),
    CancelAll,
}

struct Submitted {
    node_id: String,
    result: Result<Submission, ExecutorError>,
}

/// A node between submission and its terminal event
#[derive(Default)]
struct InFlight {
    job: Option<JobHandle>,
    transport: Option<JobStatusTransport>,
}

struct Inner {
    pipeline: Pipeline,
    log: ExecutionLog,
    run: RunState,
    running: bool,

    /// Set by a pipeline cancel; nothing new is submitted for the rest of the run
    cancelled: bool,
    in_flight: HashMap<String, InFlight>,

    /// Job id -> node id, for jobs whose events are still wanted
    jobs: HashMap<String, String>,
}

/// Receiving ends of the run loop; holding them means owning the run
struct Inbox {
    commands: mpsc::UnboundedReceiver<Command>,
    submissions: mpsc::UnboundedReceiver<Submitted>,
    transport: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Inbox {
    fn drain(&mut self) {
        while self.commands.try_recv().is_ok() {}
        while self.submissions.try_recv().is_ok() {}
        while self.transport.try_recv().is_ok() {}
    }
}

/// Owns one pipeline and drives its runs
///
/// All node state changes happen inside [`PipelineStore::run`]; cancellation
/// from other tasks is delivered to the run loop as a command.
pub struct PipelineStore {
    pipeline_id: String,
    inner: Mutex<Inner>,
    inbox: Mutex<Inbox>,
    command_tx: mpsc::UnboundedSender<Command>,
    submission_tx: mpsc::UnboundedSender<Submitted>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    executors: ExecutorRegistry,
    persistence: Option<Arc<dyn PersistenceAdapter>>,
    scheduler: ExecutionScheduler,
    options: StoreOptions,
    event_handlers: std::sync::Mutex<Vec<EventHandler>>,
}

impl PipelineStore {
    pub fn new(
        pipeline: Pipeline,
        executors: ExecutorRegistry,
        persistence: Option<Arc<dyn PersistenceAdapter>>,
        options: StoreOptions,
    ) -> Self {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (submission_tx, submissions) = mpsc::unbounded_channel();
        let (transport_tx, transport) = mpsc::unbounded_channel();

        Self {
            pipeline_id: pipeline.id.clone(),
            inner: Mutex::new(Inner {
                pipeline,
                log: ExecutionLog::new(),
                run: RunState::default(),
                running: false,
                cancelled: false,
                in_flight: HashMap::new(),
                jobs: HashMap::new(),
            }),
            inbox: Mutex::new(Inbox {
                commands,
                submissions,
                transport,
            }),
            command_tx,
            submission_tx,
            transport_tx,
            executors,
            persistence,
            scheduler: ExecutionScheduler::new(options.strategy),
            options,
            event_handlers: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(StoreEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.event_handlers.lock().unwrap_or_else(|e| e.into_inner());
        handlers.push(Arc::new(handler));
    }

    /// Emit events to all handlers
    fn emit(&self, events: Vec<StoreEvent>) {
        if events.is_empty() {
            return;
        }
        let handlers: Vec<EventHandler> = self
            .event_handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for event in events {
            for handler in &handlers {
                handler(event.clone());
            }
        }
    }

    /// Snapshot of the pipeline
    pub async fn pipeline(&self) -> Pipeline {
        self.inner.lock().await.pipeline.clone()
    }

    pub async fn node(&self, id: &str) -> Option<PipelineNode> {
        self.inner.lock().await.pipeline.node(id).cloned()
    }

    /// Execution log of the current or last run
    pub async fn log(&self) -> Vec<ExecutionLogEntry> {
        self.inner.lock().await.log.entries().to_vec()
    }

    /// Blocked node -> failed dependency that caused it
    pub async fn blocked(&self) -> BTreeMap<String, String> {
        self.inner.lock().await.run.blocked.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.running
    }

    /// True when the last save failed and local state is ahead of the backend
    pub async fn has_unsynced_changes(&self) -> bool {
        self.inner.lock().await.run.unsynced
    }

    /// Run every eligible node until the pipeline settles
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let mut guard = self
            .inbox
            .try_lock()
            .map_err(|_| PipelineError::AlreadyRunning(self.pipeline_id.clone()))?;
        let inbox: &mut Inbox = &mut guard;
        inbox.drain();

        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock().await;
            inner.running = true;
            inner.cancelled = false;
            inner.run.start();
            inner.log = ExecutionLog::new();
            inner.pipeline.set_status(PipelineStatus::Running);
            info!("Starting pipeline run: {} ({})", inner.pipeline.name, self.pipeline_id);
            events.push(StoreEvent::PipelineStarted {
                pipeline_id: self.pipeline_id.clone(),
                name: inner.pipeline.name.clone(),
            });
            inner.settle_leftovers(&mut events);
        }
        self.emit(events);
        self.persist().await;

        loop {
            self.dispatch_ready().await;
            if self.is_idle().await {
                break;
            }

            let terminal = tokio::select! {
                Some(command) = inbox.commands.recv() => self.handle_command(command).await,
                Some(submitted) = inbox.submissions.recv() => self.handle_submission(submitted).await,
                Some(event) = inbox.transport.recv() => self.handle_transport(event).await,
                else => break,
            };
            if terminal {
                self.persist().await;
            }
        }

        let (mut report, status) = {
            let mut inner = self.inner.lock().await;
            let status = if inner.pipeline.is_settled() && !inner.pipeline.has_errors() {
                PipelineStatus::Completed
            } else {
                PipelineStatus::Failed
            };
            inner.pipeline.set_status(status);
            inner.running = false;
            inner.run.finish();
            (inner.report(status), status)
        };

        info!(
            "Pipeline {} finished: {} ({} completed, {} failed, {} blocked)",
            self.pipeline_id,
            status,
            report.completed.len(),
            report.failed.len(),
            report.blocked.len()
        );
        self.emit(vec![StoreEvent::PipelineFinished {
            pipeline_id: self.pipeline_id.clone(),
            status,
        }]);

        report.unsynced = !self.persist().await;
        Ok(report)
    }

    /// Cancel a queued or running node; completed nodes are left untouched
    pub async fn cancel_node(&self, node_id: &str) -> Result<(), PipelineError> {
        let running = {
            let inner = self.inner.lock().await;
            if inner.pipeline.node(node_id).is_none() {
                return Err(PipelineError::UnknownNode(node_id.to_string()));
            }
            inner.running
        };

        if running {
            let _ = self.command_tx.send(Command::Cancel(node_id.to_string()));
        } else {
            debug!("No active run for {}; nothing to cancel", self.pipeline_id);
        }
        Ok(())
    }

    /// Cancel every queued or running node
    pub async fn cancel_pipeline(&self) -> Result<(), PipelineError> {
        if self.is_running().await {
            info!("Cancelling pipeline {}", self.pipeline_id);
            let _ = self.command_tx.send(Command::CancelAll);
        }
        Ok(())
    }

    /// Reset a failed node and the nodes it blocked, for a fresh execution
    ///
    /// Returns the ids that were reset.
    pub async fn rerun_node(&self, node_id: &str) -> Result<Vec<String>, PipelineError> {
        let reset = {
            let mut inner = self.inner.lock().await;
            if inner.running {
                return Err(PipelineError::AlreadyRunning(self.pipeline_id.clone()));
            }
            inner
                .pipeline
                .node_mut(node_id)
                .ok_or_else(|| PipelineError::UnknownNode(node_id.to_string()))?
                .reset_for_rerun()?;
            inner.run.blocked.remove(node_id);

            let mut reset = vec![node_id.to_string()];
            for id in inner.pipeline.descendants(node_id) {
                let Some(node) = inner.pipeline.node_mut(&id) else {
                    continue;
                };
                // Nodes that never got a job were blocked or cancelled before submission
                if node.status() == NodeStatus::Error && node.job_id().is_none() {
                    node.reset_for_rerun()?;
                    inner.run.blocked.remove(&id);
                    reset.push(id);
                }
            }

            inner.pipeline.set_status(PipelineStatus::Draft);
            reset
        };

        info!("Reset {} node(s) for re-run from {}", reset.len(), node_id);
        self.persist().await;
        Ok(reset)
    }

    /// Save the pipeline; on failure mark it unsynced and keep local state
    ///
    /// Returns true when the backend has the current state.
    pub async fn persist(&self) -> bool {
        let Some(adapter) = &self.persistence else {
            return true;
        };

        let snapshot = self.pipeline().await;
        let options = SaveOptions {
            conversation_id: self.options.conversation_id.clone(),
        };

        match adapter.save(&snapshot, &options).await {
            Ok(_) => {
                self.inner.lock().await.run.unsynced = false;
                true
            }
            Err(e) => {
                warn!("Failed to save pipeline {}; keeping local state: {}", self.pipeline_id, e);
                self.inner.lock().await.run.unsynced = true;
                self.emit(vec![StoreEvent::SyncFailed {
                    pipeline_id: self.pipeline_id.clone(),
                    error: e.to_string(),
                }]);
                false
            }
        }
    }

    async fn is_idle(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.in_flight.is_empty() && (inner.cancelled || self.scheduler.next_nodes(&inner.pipeline).is_empty())
    }

    /// Queue eligible nodes and submit them to their executors
    async fn dispatch_ready(&self) {
        let mut events = Vec::new();
        let submissions = {
            let mut inner = self.inner.lock().await;
            let mut submissions = Vec::new();
            if inner.cancelled {
                return;
            }

            for id in self.scheduler.next_nodes(&inner.pipeline) {
                let input = inner.input_for(&id);
                let Some(node) = inner.pipeline.node_mut(&id) else {
                    continue;
                };
                if let Err(e) = node.mark_queued() {
                    warn!("Not queuing node {}: {}", id, e);
                    continue;
                }
                submissions.push((id.clone(), node.node_type, node.config.clone(), input));
                inner.in_flight.insert(id.clone(), InFlight::default());
                events.push(StoreEvent::NodeQueued { node_id: id });
            }
            submissions
        };
        self.emit(events);

        for (node_id, node_type, config, input) in submissions {
            let executor = self.executors.get(node_type);
            let tx = self.submission_tx.clone();
            let session_id = self.options.session_id.clone();
            debug!("Submitting node {} ({})", node_id, node_type);

            tokio::spawn(async move {
                let result = executor.execute(node_type, &config, &input, &session_id).await;
                let _ = tx.send(Submitted { node_id, result });
            });
        }
    }

    /// Returns true when a node reached a terminal state
    async fn handle_submission(&self, submitted: Submitted) -> bool {
        let Submitted { node_id, result } = submitted;
        let mut events = Vec::new();
        let mut orphaned: Option<(NodeType, JobHandle)> = None;

        let terminal = {
            let mut inner = self.inner.lock().await;
            let Some((status, node_type)) = inner.pipeline.node(&node_id).map(|n| (n.status(), n.node_type)) else {
                return false;
            };

            if status != NodeStatus::Queued {
                // Cancelled while the submission was outstanding
                inner.in_flight.remove(&node_id);
                if let Ok(Submission::Job(job)) = result {
                    orphaned = Some((node_type, job));
                }
                false
            } else {
                match result {
                    Ok(Submission::Job(job)) => {
                        inner.start_job(&node_id, node_type, job, self, &mut events);
                        false
                    }
                    Ok(Submission::Ready(output)) => {
                        inner.in_flight.remove(&node_id);
                        let started = Utc::now();
                        if let Some(node) = inner.pipeline.node_mut(&node_id) {
                            if let Err(e) = node.mark_running(None) {
                                warn!("{}", e);
                            }
                        }
                        events.push(StoreEvent::NodeStarted {
                            node_id: node_id.clone(),
                            job_id: None,
                        });
                        inner.complete_node(&node_id, Some(started), output, &mut events);
                        true
                    }
                    Err(e) => {
                        inner.in_flight.remove(&node_id);
                        error!("Submission of node {} failed: {}", node_id, e);
                        inner.fail_node(&node_id, &format!("Submission failed: {}", e), false, &mut events);
                        true
                    }
                }
            }
        };
        self.emit(events);

        if let Some((node_type, job)) = orphaned {
            info!("Node {} was cancelled before job {} was accepted", node_id, job);
            self.cancel_remote(node_type, &job).await;
        }
        terminal
    }

    async fn handle_transport(&self, event: TransportEvent) -> bool {
        let mut events = Vec::new();

        let terminal = {
            let mut inner = self.inner.lock().await;
            let Some(node_id) = inner.jobs.get(&event.job_id).cloned() else {
                debug!("Ignoring event for stale job {}", event.job_id);
                return false;
            };

            match event.kind {
                TransportEventKind::Update(status) => {
                    if let Some(node) = inner.pipeline.node_mut(&node_id) {
                        node.record_progress(status.percent(), status.progress_message.clone());
                        events.push(StoreEvent::NodeProgress {
                            node_id: node_id.clone(),
                            progress: node.progress(),
                            message: node.progress_message().map(str::to_string),
                        });
                    }
                    false
                }
                TransportEventKind::Completed(status) => {
                    inner.release_job(&node_id, &event.job_id);
                    let started = inner.run.node_started.get(&node_id).copied();
                    inner.complete_node(&node_id, started, status.data, &mut events);
                    true
                }
                TransportEventKind::Failed(failure) => {
                    inner.release_job(&node_id, &event.job_id);
                    warn!("Node {} failed: {}", node_id, failure);
                    inner.fail_node(&node_id, &failure.to_string(), failure.is_budget_exceeded(), &mut events);
                    true
                }
            }
        };

        self.emit(events);
        terminal
    }

    async fn handle_command(&self, command: Command) -> bool {
        let targets: Vec<String> = {
            let mut inner = self.inner.lock().await;
            match command {
                Command::Cancel(id) => vec![id],
                Command::CancelAll => {
                    inner.cancelled = true;
                    inner
                        .pipeline
                        .in_flight_nodes()
                        .iter()
                        .map(|n| n.id.clone())
                        .collect()
                }
            }
        };

        let mut events = Vec::new();
        let mut remote = Vec::new();
        {
            let mut inner = self.inner.lock().await;
            for id in targets {
                let Some((status, node_type)) = inner.pipeline.node(&id).map(|n| (n.status(), n.node_type)) else {
                    continue;
                };
                match status {
                    NodeStatus::Queued => {
                        // The submission result is still pending; it is cancelled on arrival
                        inner.cancel_node(&id, &mut events);
                    }
                    NodeStatus::Running => {
                        if let Some(flight) = inner.in_flight.remove(&id) {
                            if let Some(transport) = &flight.transport {
                                transport.stop();
                            }
                            if let Some(job) = flight.job {
                                inner.jobs.remove(&job.job_id);
                                remote.push((node_type, job));
                            }
                        }
                        inner.cancel_node(&id, &mut events);
                    }
                    other => debug!("Node {} is {}; nothing to cancel", id, other),
                }
            }
        }

        let terminal = !events.is_empty();
        self.emit(events);
        for (node_type, job) in remote {
            self.cancel_remote(node_type, &job).await;
        }
        terminal
    }

    /// Best-effort cancellation through the node's executor
    async fn cancel_remote(&self, node_type: NodeType, job: &JobHandle) {
        if let Err(e) = self.executors.get(node_type).cancel(job).await {
            warn!("Cancelling job {} failed: {}", job, e);
        }
    }
}

impl Inner {
    /// JSON object of dependency id -> result metadata
    fn input_for(&self, node_id: &str) -> Value {
        let mut input = Map::new();
        for dep in self.pipeline.dependencies(node_id) {
            let result = self
                .pipeline
                .node(dep)
                .and_then(|n| n.result_metadata().cloned())
                .unwrap_or(Value::Null);
            input.insert(dep.to_string(), result);
        }
        Value::Object(input)
    }

    /// Nodes left queued/running by an earlier run, and idle nodes behind failures
    fn settle_leftovers(&mut self, events: &mut Vec<StoreEvent>) {
        let interrupted: Vec<String> = self
            .pipeline
            .in_flight_nodes()
            .iter()
            .map(|n| n.id.clone())
            .collect();
        for id in interrupted {
            warn!("Node {} was left in flight by an earlier run", id);
            self.fail_node(&id, "Interrupted: the previous run ended before the job reported back", false, events);
        }

        let failed: Vec<String> = self
            .pipeline
            .nodes()
            .iter()
            .filter(|n| n.status() == NodeStatus::Error)
            .map(|n| n.id.clone())
            .collect();
        for id in failed {
            self.block_dependents(&id, events);
        }
    }

    fn start_job(
        &mut self,
        node_id: &str,
        node_type: NodeType,
        job: JobHandle,
        store: &PipelineStore,
        events: &mut Vec<StoreEvent>,
    ) {
        let Some(node) = self.pipeline.node_mut(node_id) else {
            return;
        };
        if let Err(e) = node.mark_running(Some(job.job_id.clone())) {
            warn!("{}", e);
            return;
        }
        info!("Node {} running as job {}", node_id, job);

        self.run.node_started.insert(node_id.to_string(), Utc::now());
        self.jobs.insert(job.job_id.clone(), node_id.to_string());

        let source = Arc::new(ExecutorStatusSource::new(store.executors.get(node_type)));
        let transport = JobStatusTransport::start(
            job.clone(),
            source,
            store.options.transport.clone(),
            store.transport_tx.clone(),
        );
        self.in_flight.insert(
            node_id.to_string(),
            InFlight {
                job: Some(job.clone()),
                transport: Some(transport),
            },
        );
        events.push(StoreEvent::NodeStarted {
            node_id: node_id.to_string(),
            job_id: Some(job.job_id),
        });
    }

    fn release_job(&mut self, node_id: &str, job_id: &str) {
        self.jobs.remove(job_id);
        if let Some(flight) = self.in_flight.remove(node_id) {
            if let Some(transport) = &flight.transport {
                transport.stop();
            }
        }
    }

    fn complete_node(
        &mut self,
        node_id: &str,
        started: Option<chrono::DateTime<Utc>>,
        result: Option<Value>,
        events: &mut Vec<StoreEvent>,
    ) {
        let Some(node) = self.pipeline.node_mut(node_id) else {
            return;
        };
        if let Err(e) = node.mark_completed(result.clone()) {
            warn!("{}", e);
            return;
        }
        self.run.node_started.remove(node_id);

        let entry = ExecutionLogEntry::completed(node_id, started, result);
        let duration_ms = entry.duration_ms;
        self.log.append(entry);
        self.pipeline.touch();

        info!("Node {} completed", node_id);
        events.push(StoreEvent::NodeCompleted {
            node_id: node_id.to_string(),
            duration_ms,
        });
    }

    fn fail_node(&mut self, node_id: &str, message: &str, budget_exceeded: bool, events: &mut Vec<StoreEvent>) {
        if !self.record_error(node_id, message) {
            return;
        }
        events.push(StoreEvent::NodeFailed {
            node_id: node_id.to_string(),
            error: message.to_string(),
            budget_exceeded,
        });
        self.block_dependents(node_id, events);
    }

    fn cancel_node(&mut self, node_id: &str, events: &mut Vec<StoreEvent>) {
        if !self.record_error(node_id, CANCELLED_MESSAGE) {
            return;
        }
        info!("Cancelled node {}", node_id);
        events.push(StoreEvent::NodeCancelled {
            node_id: node_id.to_string(),
        });
        self.block_dependents(node_id, events);
    }

    /// Move a node to error and log it; false if the transition is not allowed
    fn record_error(&mut self, node_id: &str, message: &str) -> bool {
        let Some(node) = self.pipeline.node_mut(node_id) else {
            return false;
        };
        if let Err(e) = node.mark_failed(message) {
            warn!("{}", e);
            return false;
        }
        let started = self.run.node_started.remove(node_id);
        self.log.append(ExecutionLogEntry::failed(node_id, started, message));
        self.pipeline.touch();
        true
    }

    /// Mark idle nodes downstream of `failed` as blocked by it
    fn block_dependents(&mut self, failed: &str, events: &mut Vec<StoreEvent>) {
        for id in self.pipeline.pending_descendants(failed) {
            let Some(node) = self.pipeline.node_mut(&id) else {
                continue;
            };
            if node.status() != NodeStatus::Idle {
                continue;
            }
            let message = format!("Blocked: dependency '{}' failed", failed);
            if node.mark_failed(&message).is_err() {
                continue;
            }
            debug!("Node {} blocked by {}", id, failed);
            self.run.blocked.insert(id.clone(), failed.to_string());
            self.log.append(ExecutionLogEntry::failed(&id, None, message));
            events.push(StoreEvent::NodeBlocked {
                node_id: id,
                blocked_by: failed.to_string(),
            });
        }
    }

    fn report(&self, status: PipelineStatus) -> RunReport {
        let order = self.pipeline.execution_order();
        let completed = order
            .iter()
            .filter(|id| {
                self.pipeline
                    .node(id)
                    .is_some_and(|n| n.status() == NodeStatus::Completed)
            })
            .cloned()
            .collect();

        let mut failed = BTreeMap::new();
        let mut blocked = BTreeMap::new();
        for node in self.pipeline.nodes() {
            if node.status() != NodeStatus::Error {
                continue;
            }
            match self.run.blocked.get(&node.id) {
                Some(cause) => {
                    blocked.insert(node.id.clone(), cause.clone());
                }
                None => {
                    failed.insert(node.id.clone(), node.error().unwrap_or_default().to_string());
                }
            }
        }

        RunReport {
            pipeline_id: self.pipeline.id.clone(),
            status,
            completed,
            failed,
            blocked,
            log: self.log.entries().to_vec(),
            unsynced: self.run.unsynced,
        }
    }
}
