//! Test: Cancellation - user cancels nodes and pipelines mid-run

use crate::helpers::*;
use biopipe::core::{NodeStatus, PipelineError, PipelineStatus};
use biopipe::execution::{SchedulingStrategy, StoreEvent, CANCELLED_MESSAGE};
use std::sync::Arc;
use std::time::Duration;

/// Cancelling a running node stops its job and blocks what depends on it
#[tokio::test(start_paused = true)]
async fn test_cancel_running_node() {
    let executor = Arc::new(MockExecutor::new().with_script("fold", Script::hangs()));
    let store = new_store(binder_pipeline(), executor.clone(), None, test_options());
    let events = record_events(&store);

    let runner = tokio::spawn({
        let store = store.clone();
        async move { store.run().await }
    });
    wait_for_status(&store, "fold", NodeStatus::Running).await;
    let fold_job = store.node("fold").await.unwrap().job_id().unwrap().to_string();

    store.cancel_node("fold").await.unwrap();
    let report = runner.await.unwrap().unwrap();

    assert!(!report.is_success());
    assert_eq!(report.completed, vec!["target", "backbone", "sequence"]);
    assert_eq!(report.failed.get("fold").map(String::as_str), Some(CANCELLED_MESSAGE));
    assert_eq!(report.blocked.get("dock").map(String::as_str), Some("fold"));
    assert_eq!(executor.cancelled(), vec![fold_job]);

    let events = events.lock().unwrap().clone();
    assert!(events.contains(&StoreEvent::NodeCancelled {
        node_id: "fold".into()
    }));
    assert!(!store.is_running().await);
}

/// Completed nodes survive a pipeline cancel
#[tokio::test(start_paused = true)]
async fn test_cancel_pipeline_keeps_completed_nodes() {
    let executor = Arc::new(MockExecutor::new().with_script("sequence", Script::hangs()));
    let store = new_store(binder_pipeline(), executor.clone(), None, test_options());

    let runner = tokio::spawn({
        let store = store.clone();
        async move { store.run().await }
    });
    wait_for_status(&store, "sequence", NodeStatus::Running).await;

    store.cancel_pipeline().await.unwrap();
    let report = runner.await.unwrap().unwrap();

    assert_eq!(report.completed, vec!["target", "backbone"]);
    assert_eq!(store.node("backbone").await.unwrap().status(), NodeStatus::Completed);
    assert_eq!(report.failed.get("sequence").map(String::as_str), Some(CANCELLED_MESSAGE));
    assert_eq!(report.blocked.get("fold").map(String::as_str), Some("sequence"));
    assert_eq!(report.blocked.get("dock").map(String::as_str), Some("sequence"));
    assert_eq!(executor.cancelled().len(), 1);
}

/// After a pipeline cancel nothing new is submitted, even with nodes still waiting their turn
#[tokio::test(start_paused = true)]
async fn test_cancel_pipeline_stops_sequential_run() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "Two designs"
nodes:
  - id: "a"
    type: "sequence-design"
    config:
      script: "a"
  - id: "b"
    type: "sequence-design"
    config:
      script: "b"
"#,
    );
    let executor = Arc::new(MockExecutor::new().with_script("a", Script::hangs()));
    let store = new_store(
        pipeline,
        executor.clone(),
        None,
        with_strategy(test_options(), SchedulingStrategy::Sequential),
    );

    let runner = tokio::spawn({
        let store = store.clone();
        async move { store.run().await }
    });
    wait_for_status(&store, "a", NodeStatus::Running).await;

    store.cancel_pipeline().await.unwrap();
    let report = runner.await.unwrap().unwrap();

    assert!(report.completed.is_empty());
    assert_eq!(report.failed.get("a").map(String::as_str), Some(CANCELLED_MESSAGE));
    assert_eq!(store.node("b").await.unwrap().status(), NodeStatus::Idle);
    assert_eq!(executor.submissions().len(), 1);
    assert_eq!(store.pipeline().await.status(), PipelineStatus::Failed);
}

/// A node cancelled while its submission is outstanding never runs
#[tokio::test(start_paused = true)]
async fn test_cancel_while_queued() {
    let executor = Arc::new(
        MockExecutor::new().with_script("backbone", Script::hangs().slow_submit(Duration::from_secs(30))),
    );
    let store = new_store(binder_pipeline(), executor.clone(), None, test_options());

    let runner = tokio::spawn({
        let store = store.clone();
        async move { store.run().await }
    });
    wait_for_status(&store, "backbone", NodeStatus::Queued).await;

    store.cancel_node("backbone").await.unwrap();
    let report = runner.await.unwrap().unwrap();

    let backbone = store.node("backbone").await.unwrap();
    assert_eq!(backbone.status(), NodeStatus::Error);
    assert_eq!(backbone.error(), Some(CANCELLED_MESSAGE));
    assert!(backbone.job_id().is_none());
    assert_eq!(report.blocked.get("sequence").map(String::as_str), Some("backbone"));

    // The job the service accepted after the cancel is cancelled too
    assert_eq!(executor.cancelled(), vec!["job-0"]);
}

/// Cancelling outside a run, or a finished node, changes nothing
#[tokio::test(start_paused = true)]
async fn test_cancel_is_noop_for_settled_nodes() {
    let store = new_store(binder_pipeline(), Arc::new(MockExecutor::new()), None, test_options());

    assert!(matches!(
        store.cancel_node("nope").await,
        Err(PipelineError::UnknownNode(_))
    ));
    store.cancel_node("fold").await.unwrap();
    store.cancel_pipeline().await.unwrap();
    assert_eq!(store.node("fold").await.unwrap().status(), NodeStatus::Idle);

    let report = store.run().await.unwrap();
    assert!(report.is_success());

    store.cancel_node("fold").await.unwrap();
    assert_eq!(store.node("fold").await.unwrap().status(), NodeStatus::Completed);
}

/// Only one run may drive a store at a time
#[tokio::test(start_paused = true)]
async fn test_concurrent_run_rejected() {
    let executor = Arc::new(MockExecutor::new().with_script("backbone", Script::hangs()));
    let store = new_store(binder_pipeline(), executor, None, test_options());

    let runner = tokio::spawn({
        let store = store.clone();
        async move { store.run().await }
    });
    wait_for_status(&store, "backbone", NodeStatus::Running).await;

    assert!(matches!(store.run().await, Err(PipelineError::AlreadyRunning(_))));
    assert!(matches!(
        store.rerun_node("backbone").await,
        Err(PipelineError::AlreadyRunning(_))
    ));

    store.cancel_pipeline().await.unwrap();
    runner.await.unwrap().unwrap();
}
