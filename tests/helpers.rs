//! Test utility functions for biopipe

use biopipe::adapter::{ExecutorError, ExecutorRegistry, NodeExecutor, Submission};
use biopipe::core::{
    ExecutionLogEntry, NodeStatus, NodeType, Pipeline, PipelineBlueprint, PipelineStatus, RunReport,
    Selection,
};
use biopipe::execution::{PipelineStore, SchedulingStrategy, StoreEvent, StoreOptions};
use biopipe::persistence::{
    InMemoryPersistence, ListFilters, PersistenceAdapter, PersistenceError, PipelineRecord, SaveOptions,
};
use biopipe::transport::{
    FrameKind, JobHandle, JobState, JobStatus, PollSchedule, StatusFrame, TransportConfig,
    TransportError,
};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// How a scripted job behaves; polls past the end repeat the last status
#[derive(Debug, Clone, Default)]
pub struct Script {
    polls: Vec<JobStatus>,
    frames: Option<Vec<StatusFrame>>,
    keep_open: bool,
    reject: Option<String>,
    submit_delay: Option<Duration>,
}

impl Script {
    pub fn completes(data: Value) -> Self {
        Self {
            polls: vec![JobStatus::new("", JobState::Completed).with_data(data)],
            ..Default::default()
        }
    }

    pub fn fails(message: &str) -> Self {
        Self {
            polls: vec![JobStatus::new("", JobState::Error).with_error(message)],
            ..Default::default()
        }
    }

    pub fn hangs() -> Self {
        Self {
            polls: vec![JobStatus::new("", JobState::Running)],
            ..Default::default()
        }
    }

    pub fn rejected(message: &str) -> Self {
        Self {
            reject: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// The service doesn't know the job yet for the first `n` polls
    pub fn after_not_found(mut self, n: usize) -> Self {
        let mut polls = vec![JobStatus::new("", JobState::NotFound); n];
        polls.append(&mut self.polls);
        self.polls = polls;
        self
    }

    pub fn after_progress(mut self, percent: f64, message: &str) -> Self {
        self.polls
            .insert(0, JobStatus::new("", JobState::Running).with_progress(percent, message));
        self
    }

    /// Offer a push channel that delivers these frames
    pub fn pushing(mut self, frames: Vec<StatusFrame>) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Keep the push channel open after its frames were delivered
    pub fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }

    /// Delay the submission response
    pub fn slow_submit(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }
}

pub fn frame(kind: FrameKind, status: JobStatus) -> StatusFrame {
    StatusFrame::from_status(kind, status)
}

/// Executor for remote node types; the node's `script` config picks its behavior
#[derive(Default)]
pub struct MockExecutor {
    scripts: HashMap<String, Script>,
    next_job: AtomicUsize,

    /// Job id -> (script name, polls served)
    jobs: Mutex<HashMap<String, (String, usize)>>,
    submissions: Mutex<Vec<(String, Value)>>,
    cancelled: Mutex<Vec<String>>,
    open_channels: Mutex<Vec<mpsc::Sender<StatusFrame>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    fn script(&self, name: &str) -> Script {
        self.scripts
            .get(name)
            .cloned()
            .unwrap_or_else(|| Script::completes(json!({ "script": name })))
    }

    /// (script name, input) of every submission in order
    pub fn submissions(&self) -> Vec<(String, Value)> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn input_for(&self, script: &str) -> Option<Value> {
        self.submissions()
            .into_iter()
            .find(|(name, _)| name == script)
            .map(|(_, input)| input)
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn polls_for(&self, job_id: &str) -> usize {
        self.jobs.lock().unwrap().get(job_id).map_or(0, |(_, n)| *n)
    }

    pub fn total_polls(&self) -> usize {
        self.jobs.lock().unwrap().values().map(|(_, n)| n).sum()
    }
}

#[async_trait]
impl NodeExecutor for MockExecutor {
    async fn execute(
        &self,
        _node_type: NodeType,
        config: &Map<String, Value>,
        input: &Value,
        _session_id: &str,
    ) -> Result<Submission, ExecutorError> {
        let name = config
            .get("script")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();
        let script = self.script(&name);
        self.submissions.lock().unwrap().push((name.clone(), input.clone()));

        if let Some(delay) = script.submit_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = script.reject {
            return Err(ExecutorError::Rejected(message));
        }

        let job_id = format!("job-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
        self.jobs.lock().unwrap().insert(job_id.clone(), (name, 0));
        Ok(Submission::Job(JobHandle::new(job_id, "mock")))
    }

    async fn check_status(&self, job: &JobHandle) -> Result<JobStatus, TransportError> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some((name, served)) = jobs.get_mut(&job.job_id) else {
            return Ok(JobStatus::new(&job.job_id, JobState::NotFound));
        };
        let script = self.script(name);
        let index = (*served).min(script.polls.len().saturating_sub(1));
        *served += 1;

        let mut status = script
            .polls
            .get(index)
            .cloned()
            .unwrap_or_else(|| JobStatus::new("", JobState::Running));
        status.job_id = job.job_id.clone();
        Ok(status)
    }

    async fn subscribe(&self, job: &JobHandle) -> Result<mpsc::Receiver<StatusFrame>, TransportError> {
        let name = self
            .jobs
            .lock()
            .unwrap()
            .get(&job.job_id)
            .map(|(name, _)| name.clone())
            .unwrap_or_default();
        let script = self.script(&name);
        let Some(frames) = script.frames else {
            return Err(TransportError::PushUnavailable("mock has no stream".into()));
        };

        let (tx, rx) = mpsc::channel(frames.len() + 1);
        for frame in frames {
            tx.try_send(frame).unwrap();
        }
        if script.keep_open {
            self.open_channels.lock().unwrap().push(tx);
        }
        Ok(rx)
    }

    async fn cancel(&self, job: &JobHandle) -> Result<(), ExecutorError> {
        self.cancelled.lock().unwrap().push(job.job_id.clone());
        Ok(())
    }
}

/// In-memory backend whose saves can be switched to fail
#[derive(Default)]
pub struct FlakyPersistence {
    inner: InMemoryPersistence,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl FlakyPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceAdapter for FlakyPersistence {
    async fn save(&self, pipeline: &Pipeline, options: &SaveOptions) -> Result<String, PersistenceError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Backend("503 Service Unavailable".into()));
        }
        self.inner.save(pipeline, options).await
    }

    async fn load(&self, id: &str) -> Result<Pipeline, PersistenceError> {
        self.inner.load(id).await
    }

    async fn list(&self, filters: &ListFilters) -> Result<Vec<PipelineRecord>, PersistenceError> {
        self.inner.list(filters).await
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.inner.delete(id).await
    }
}

/// Fixed 1s polling, no push channel
pub fn test_options() -> StoreOptions {
    StoreOptions {
        session_id: "test-session".into(),
        transport: TransportConfig {
            schedule: PollSchedule::fixed(Duration::from_secs(1)),
            budget: Duration::from_secs(600),
            prefer_push: false,
        },
        ..Default::default()
    }
}

pub fn push_options() -> StoreOptions {
    let mut options = test_options();
    options.transport.prefer_push = true;
    options
}

pub fn with_strategy(mut options: StoreOptions, strategy: SchedulingStrategy) -> StoreOptions {
    options.strategy = strategy;
    options
}

/// Approve every node of a YAML blueprint
pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    let blueprint = PipelineBlueprint::from_str(yaml).unwrap();
    biopipe::core::blueprint::approve(&blueprint, &Selection::all()).unwrap()
}

pub fn new_store(
    pipeline: Pipeline,
    executor: Arc<MockExecutor>,
    persistence: Option<Arc<dyn PersistenceAdapter>>,
    options: StoreOptions,
) -> Arc<PipelineStore> {
    Arc::new(PipelineStore::new(
        pipeline,
        ExecutorRegistry::uniform(executor),
        persistence,
        options,
    ))
}

pub fn record_events(store: &PipelineStore) -> Arc<Mutex<Vec<StoreEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    store.add_event_handler(move |event| sink.lock().unwrap().push(event));
    events
}

/// Wait (in paused time) until a node reaches a status
pub async fn wait_for_status(store: &PipelineStore, node_id: &str, status: NodeStatus) {
    for _ in 0..1000 {
        if store.node(node_id).await.map(|n| n.status()) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("Node {} never reached {}", node_id, status);
}

/// Result of running a pipeline through a store
pub struct PipelineTestResult {
    pub report: RunReport,
    pub pipeline: Pipeline,
    pub events: Vec<StoreEvent>,
}

impl PipelineTestResult {
    pub fn log_entry(&self, node_id: &str) -> Option<&ExecutionLogEntry> {
        self.report.log.iter().find(|e| e.node_id == node_id)
    }

    pub fn count_events(&self, pred: impl Fn(&StoreEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

pub async fn run_pipeline_with_mock(pipeline: Pipeline, executor: Arc<MockExecutor>) -> PipelineTestResult {
    run_pipeline_with(pipeline, executor, None, test_options()).await
}

pub async fn run_pipeline_with(
    pipeline: Pipeline,
    executor: Arc<MockExecutor>,
    persistence: Option<Arc<dyn PersistenceAdapter>>,
    options: StoreOptions,
) -> PipelineTestResult {
    let store = new_store(pipeline, executor, persistence, options);
    let events = record_events(&store);
    let report = store.run().await.unwrap();

    let result = PipelineTestResult {
        report,
        pipeline: store.pipeline().await,
        events: events.lock().unwrap().clone(),
    };
    result
}

pub fn assert_pipeline_completed(result: &PipelineTestResult) {
    assert!(
        result.report.is_success(),
        "Expected pipeline to complete, got {:?} (failed: {:?}, blocked: {:?})",
        result.report.status,
        result.report.failed,
        result.report.blocked
    );
    assert_eq!(result.pipeline.status(), PipelineStatus::Completed);
}

pub fn assert_pipeline_failed(result: &PipelineTestResult) {
    assert_eq!(
        result.report.status,
        PipelineStatus::Failed,
        "Expected pipeline to fail"
    );
    assert_eq!(result.pipeline.status(), PipelineStatus::Failed);
}

pub fn assert_node_completed(result: &PipelineTestResult, node_id: &str) {
    let node = result
        .pipeline
        .node(node_id)
        .unwrap_or_else(|| panic!("Node '{}' not found", node_id));
    assert_eq!(
        node.status(),
        NodeStatus::Completed,
        "Node '{}' should be completed (error: {:?})",
        node_id,
        node.error()
    );
}

pub fn assert_node_failed(result: &PipelineTestResult, node_id: &str, expected_error: &str) {
    let message = result
        .report
        .failed
        .get(node_id)
        .unwrap_or_else(|| panic!("Node '{}' did not fail; report: {:?}", node_id, result.report.failed));
    assert!(
        message.contains(expected_error),
        "Node '{}' error should contain '{}', got: {}",
        node_id,
        expected_error,
        message
    );
}

pub fn assert_node_blocked(result: &PipelineTestResult, node_id: &str, blocked_by: &str) {
    assert_eq!(
        result.report.blocked.get(node_id).map(String::as_str),
        Some(blocked_by),
        "Node '{}' should be blocked by '{}'",
        node_id,
        blocked_by
    );
    let node = result.pipeline.node(node_id).unwrap();
    assert_eq!(node.status(), NodeStatus::Error);
    assert!(node.job_id().is_none(), "Blocked node '{}' must never get a job", node_id);
}

/// Order in which nodes completed, from the execution log
pub fn assert_execution_order(result: &PipelineTestResult, expected_order: &[&str]) {
    let actual_order: Vec<&str> = result
        .report
        .log
        .iter()
        .filter(|e| e.status == NodeStatus::Completed)
        .map(|e| e.node_id.as_str())
        .collect();

    assert_eq!(
        actual_order, expected_order,
        "Expected execution order: {:?}\nActual: {:?}",
        expected_order, actual_order
    );
}

/// Input -> backbone -> sequence -> fold, with fold and the target feeding dock
pub const BINDER_BLUEPRINT: &str = r#"
name: "Binder design"
rationale: "Design binders against the target, then fold and dock them"
nodes:
  - id: "target"
    type: "input"
    config:
      pdb_id: "6M0J"
  - id: "backbone"
    type: "backbone-design"
    config:
      length: 80
      script: "backbone"
  - id: "sequence"
    type: "sequence-design"
    config:
      script: "sequence"
  - id: "fold"
    type: "structure-prediction"
    config:
      script: "fold"
  - id: "dock"
    type: "docking"
    config:
      script: "dock"
edges:
  - { source: "target", target: "backbone" }
  - { source: "backbone", target: "sequence" }
  - { source: "sequence", target: "fold" }
  - { source: "fold", target: "dock" }
  - { source: "target", target: "dock" }
"#;

pub fn binder_pipeline() -> Pipeline {
    pipeline_from_yaml(BINDER_BLUEPRINT)
}
