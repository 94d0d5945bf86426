//! Test: Dependency Order - nodes start only after every upstream node completed

use crate::helpers::*;
use biopipe::core::{NodeStatus, Pipeline, PipelineEdge, PipelineNode, NodeType};
use biopipe::execution::{SchedulingStrategy, StoreEvent};
use serde_json::{json, Map};
use std::sync::Arc;

/// The binder chain runs target -> backbone -> sequence -> fold -> dock
#[tokio::test(start_paused = true)]
async fn test_binder_chain_completes_in_order() {
    let executor = Arc::new(
        MockExecutor::new()
            .with_script("backbone", Script::completes(json!({"pdb": "backbone.pdb"})))
            .with_script("sequence", Script::completes(json!({"fasta": ">seq\nMKT"}))),
    );

    let result = run_pipeline_with_mock(binder_pipeline(), executor.clone()).await;

    assert_pipeline_completed(&result);
    assert_execution_order(&result, &["target", "backbone", "sequence", "fold", "dock"]);
    assert_eq!(result.report.progress(), 1.0);

    // Input nodes complete locally and never reach the remote executor
    let scripts: Vec<String> = executor.submissions().into_iter().map(|(name, _)| name).collect();
    assert_eq!(scripts, vec!["backbone", "sequence", "fold", "dock"]);
    assert!(result.pipeline.node("target").unwrap().job_id().is_none());
    assert_eq!(
        result.pipeline.node("target").unwrap().result_metadata(),
        Some(&json!({"pdb_id": "6M0J"}))
    );
}

/// Each node receives its dependencies' results keyed by node id
#[tokio::test(start_paused = true)]
async fn test_upstream_results_are_forwarded() {
    let executor = Arc::new(
        MockExecutor::new()
            .with_script("backbone", Script::completes(json!({"pdb": "backbone.pdb"})))
            .with_script("fold", Script::completes(json!({"plddt": 91.2}))),
    );

    let result = run_pipeline_with_mock(binder_pipeline(), executor.clone()).await;
    assert_pipeline_completed(&result);

    assert_eq!(
        executor.input_for("backbone").unwrap(),
        json!({"target": {"pdb_id": "6M0J"}})
    );
    assert_eq!(
        executor.input_for("sequence").unwrap(),
        json!({"backbone": {"pdb": "backbone.pdb"}})
    );
    // dock joins two branches
    assert_eq!(
        executor.input_for("dock").unwrap(),
        json!({"fold": {"plddt": 91.2}, "target": {"pdb_id": "6M0J"}})
    );
}

/// A node is queued only after all of its dependencies completed
#[tokio::test(start_paused = true)]
async fn test_join_waits_for_every_dependency() {
    let result = run_pipeline_with_mock(binder_pipeline(), Arc::new(MockExecutor::new())).await;
    assert_pipeline_completed(&result);

    let position = |pred: &dyn Fn(&StoreEvent) -> bool| result.events.iter().position(pred).unwrap();
    let dock_queued = position(&|e| matches!(e, StoreEvent::NodeQueued { node_id } if node_id == "dock"));
    for dep in ["fold", "target"] {
        let completed = position(&|e| matches!(e, StoreEvent::NodeCompleted { node_id, .. } if node_id == dep));
        assert!(completed < dock_queued, "dock queued before {} completed", dep);
    }

    assert_eq!(
        result.count_events(|e| matches!(e, StoreEvent::PipelineStarted { .. })),
        1
    );
    assert!(matches!(
        result.events.last(),
        Some(StoreEvent::PipelineFinished { .. })
    ));
}

fn remote(id: &str) -> PipelineNode {
    let mut config = Map::new();
    config.insert("script".into(), json!(id));
    PipelineNode::new(id, NodeType::StructurePrediction, id).with_config(config)
}

/// Independent roots are submitted together under the parallel strategy
#[tokio::test(start_paused = true)]
async fn test_independent_roots_run_in_parallel() {
    let pipeline = Pipeline::new(
        "fan-in",
        vec![remote("a"), remote("b"), remote("c")],
        vec![PipelineEdge::new("a", "c"), PipelineEdge::new("b", "c")],
    )
    .unwrap();

    let result = run_pipeline_with_mock(pipeline, Arc::new(MockExecutor::new())).await;
    assert_pipeline_completed(&result);

    let queued: Vec<&str> = result
        .events
        .iter()
        .take_while(|e| !matches!(e, StoreEvent::NodeCompleted { .. }))
        .filter_map(|e| match e {
            StoreEvent::NodeQueued { node_id } => Some(node_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(queued, vec!["a", "b"]);
}

/// With a limit of one, roots run one after the other
#[tokio::test(start_paused = true)]
async fn test_limited_parallelism_serializes_roots() {
    let pipeline = Pipeline::new("roots", vec![remote("a"), remote("b")], vec![]).unwrap();
    let executor = Arc::new(MockExecutor::new());

    let result = run_pipeline_with(
        pipeline,
        executor,
        None,
        with_strategy(test_options(), SchedulingStrategy::LimitedParallel(1)),
    )
    .await;
    assert_pipeline_completed(&result);

    let order: Vec<String> = result
        .events
        .iter()
        .filter_map(|e| match e {
            StoreEvent::NodeQueued { node_id } => Some(format!("queued:{}", node_id)),
            StoreEvent::NodeCompleted { node_id, .. } => Some(format!("done:{}", node_id)),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec!["queued:a", "done:a", "queued:b", "done:b"]);
}

/// Re-running a completed pipeline starts nothing
#[tokio::test(start_paused = true)]
async fn test_completed_pipeline_runs_nothing_again() {
    let executor = Arc::new(MockExecutor::new());
    let store = new_store(binder_pipeline(), executor.clone(), None, test_options());

    assert!(store.run().await.unwrap().is_success());
    let submitted = executor.submissions().len();

    let second = store.run().await.unwrap();
    assert!(second.is_success());
    assert!(second.log.is_empty());
    assert_eq!(executor.submissions().len(), submitted);
    assert!(store
        .pipeline()
        .await
        .nodes()
        .iter()
        .all(|n| n.status() == NodeStatus::Completed));
}
