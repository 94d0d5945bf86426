//! Test: Failure Blocking - a failed node blocks its descendants, nothing else

use crate::helpers::*;
use biopipe::core::{LogOutcome, NodeStatus};
use biopipe::execution::StoreEvent;
use serde_json::json;
use std::sync::Arc;

/// A failing fold blocks dock; everything upstream still completes
#[tokio::test(start_paused = true)]
async fn test_failure_blocks_descendants() {
    let executor = Arc::new(MockExecutor::new().with_script("fold", Script::fails("CUDA out of memory")));

    let result = run_pipeline_with_mock(binder_pipeline(), executor.clone()).await;

    assert_pipeline_failed(&result);
    assert_execution_order(&result, &["target", "backbone", "sequence"]);
    assert_node_failed(&result, "fold", "CUDA out of memory");
    assert_node_blocked(&result, "dock", "fold");

    // dock was never submitted
    assert!(executor.input_for("dock").is_none());

    let dock = result.pipeline.node("dock").unwrap();
    assert!(dock.error().unwrap().contains("dependency 'fold' failed"));

    let entry = result.log_entry("dock").unwrap();
    assert!(entry.started_at.is_none());
    assert!(entry.duration_ms.is_none());
    assert!(matches!(&entry.outcome, LogOutcome::Error(e) if e.contains("fold")));

    assert_eq!(
        result.count_events(|e| matches!(e, StoreEvent::NodeBlocked { node_id, blocked_by } if node_id == "dock" && blocked_by == "fold")),
        1
    );
}

/// Blocking is transitive and sibling branches keep running
#[tokio::test(start_paused = true)]
async fn test_sibling_branch_keeps_running() {
    let yaml = r#"
name: "Two designs"
nodes:
  - id: "target"
    type: "input"
    config: { pdb_id: "7K3G" }
  - id: "design_a"
    type: "backbone-design"
    config: { length: 60, script: "design_a" }
  - id: "seq_a"
    type: "sequence-design"
    config: { script: "seq_a" }
  - id: "fold_a"
    type: "structure-prediction"
    config: { script: "fold_a" }
  - id: "design_b"
    type: "backbone-design"
    config: { length: 90, script: "design_b" }
  - id: "seq_b"
    type: "sequence-design"
    config: { script: "seq_b" }
edges:
  - { source: "target", target: "design_a" }
  - { source: "design_a", target: "seq_a" }
  - { source: "seq_a", target: "fold_a" }
  - { source: "target", target: "design_b" }
  - { source: "design_b", target: "seq_b" }
"#;
    let executor = Arc::new(MockExecutor::new().with_script("design_a", Script::fails("diffusion diverged")));

    let result = run_pipeline_with_mock(pipeline_from_yaml(yaml), executor).await;

    assert_pipeline_failed(&result);
    assert_node_failed(&result, "design_a", "diffusion diverged");
    assert_node_blocked(&result, "seq_a", "design_a");
    assert_node_blocked(&result, "fold_a", "design_a");
    assert_node_completed(&result, "design_b");
    assert_node_completed(&result, "seq_b");

    assert_eq!(result.report.failed.len(), 1);
    assert_eq!(result.report.blocked.len(), 2);
    assert!(result.pipeline.is_settled());
}

/// A rejected submission fails the node without creating a job
#[tokio::test(start_paused = true)]
async fn test_rejected_submission() {
    let executor = Arc::new(
        MockExecutor::new().with_script("backbone", Script::rejected("length must be between 40 and 200")),
    );

    let result = run_pipeline_with_mock(binder_pipeline(), executor).await;

    assert_pipeline_failed(&result);
    assert_node_failed(&result, "backbone", "Submission failed");
    assert_node_failed(&result, "backbone", "length must be between 40 and 200");
    for node in ["sequence", "fold", "dock"] {
        assert_eq!(result.pipeline.node(node).unwrap().status(), NodeStatus::Error);
    }
    assert_node_blocked(&result, "sequence", "backbone");
    assert_node_blocked(&result, "dock", "backbone");
    assert!(result.pipeline.node("backbone").unwrap().job_id().is_none());
}

/// Failure events carry whether the job may still finish remotely
#[tokio::test(start_paused = true)]
async fn test_remote_failure_is_not_budget_exceeded() {
    let executor = Arc::new(MockExecutor::new().with_script("sequence", Script::fails("invalid backbone")));

    let result = run_pipeline_with_mock(binder_pipeline(), executor).await;

    let failure = result
        .events
        .iter()
        .find_map(|e| match e {
            StoreEvent::NodeFailed {
                node_id,
                budget_exceeded,
                ..
            } if node_id == "sequence" => Some(*budget_exceeded),
            _ => None,
        })
        .unwrap();
    assert!(!failure);
    assert_eq!(
        result.pipeline.node("sequence").unwrap().result_metadata(),
        None
    );
    assert_eq!(
        result.log_entry("backbone").unwrap().outcome,
        LogOutcome::ResultMetadata(Some(json!({"script": "backbone"})))
    );
}
