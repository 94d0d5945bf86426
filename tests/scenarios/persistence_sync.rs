//! Test: Persistence - saving runs, unsynced state and cache reconciliation

use crate::helpers::*;
use biopipe::core::{NodeStatus, PipelineStatus};
use biopipe::execution::StoreEvent;
use biopipe::persistence::{
    InMemoryPersistence, ListFilters, PersistenceAdapter, PipelineCache, SaveOptions,
};
use serde_json::json;
use std::sync::Arc;

/// The final state of a run is what the backend holds afterwards
#[tokio::test(start_paused = true)]
async fn test_run_saves_final_state() {
    let backend = Arc::new(InMemoryPersistence::new());
    let executor = Arc::new(MockExecutor::new().with_script("fold", Script::fails("OOM")));
    let pipeline = binder_pipeline();
    let id = pipeline.id.clone();

    let mut options = test_options();
    options.conversation_id = Some("chat-7".into());
    let result = run_pipeline_with(pipeline, executor, Some(backend.clone()), options).await;
    assert!(!result.report.unsynced);

    let loaded = backend.load(&id).await.unwrap();
    assert_eq!(loaded.status(), PipelineStatus::Failed);
    assert_eq!(loaded.nodes(), result.pipeline.nodes());
    assert_eq!(loaded.node("fold").unwrap().error(), Some("OOM"));
    assert_eq!(loaded.node("dock").unwrap().status(), NodeStatus::Error);

    let listed = backend
        .list(&ListFilters {
            conversation_id: Some("chat-7".into()),
            full: false,
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].is_summary());
}

/// A failing backend never loses local state; the next good save clears the flag
#[tokio::test(start_paused = true)]
async fn test_failed_save_marks_unsynced() {
    let backend = Arc::new(FlakyPersistence::new());
    backend.set_failing(true);
    let store = new_store(
        binder_pipeline(),
        Arc::new(MockExecutor::new()),
        Some(backend.clone()),
        test_options(),
    );
    let events = record_events(&store);

    let report = store.run().await.unwrap();

    assert!(report.is_success());
    assert!(report.unsynced);
    assert!(store.has_unsynced_changes().await);
    assert!(backend.saves() > 1);
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, StoreEvent::SyncFailed { error, .. } if error.contains("503"))));
    assert_eq!(store.pipeline().await.status(), PipelineStatus::Completed);

    backend.set_failing(false);
    assert!(store.persist().await);
    assert!(!store.has_unsynced_changes().await);
    assert_eq!(
        backend.load(store.pipeline_id()).await.unwrap().status(),
        PipelineStatus::Completed
    );
}

/// A stored failed pipeline can be reloaded and its failed node re-run
#[tokio::test(start_paused = true)]
async fn test_rerun_after_reload() {
    let backend: Arc<dyn PersistenceAdapter> = Arc::new(InMemoryPersistence::new());
    let failing = Arc::new(MockExecutor::new().with_script("sequence", Script::fails("timeout")));
    let first = run_pipeline_with(binder_pipeline(), failing, Some(backend.clone()), test_options()).await;
    assert_pipeline_failed(&first);
    let id = first.pipeline.id.clone();

    let reloaded = backend.load(&id).await.unwrap();
    let store = new_store(reloaded, Arc::new(MockExecutor::new()), Some(backend.clone()), test_options());

    assert!(store.rerun_node("backbone").await.is_err());
    let mut reset = store.rerun_node("sequence").await.unwrap();
    reset.sort();
    assert_eq!(reset, vec!["dock", "fold", "sequence"]);
    assert!(store.blocked().await.is_empty());
    assert_eq!(backend.load(&id).await.unwrap().status(), PipelineStatus::Draft);

    let report = store.run().await.unwrap();
    assert!(report.is_success());
    // Only the reset nodes ran in the second run
    let ran: Vec<&str> = report.log.iter().map(|e| e.node_id.as_str()).collect();
    assert_eq!(ran, vec!["sequence", "fold", "dock"]);
    assert_eq!(
        backend.load(&id).await.unwrap().status(),
        PipelineStatus::Completed
    );
}

/// Listing returns summaries; sync loads each one in full
#[tokio::test]
async fn test_sync_hydrates_summaries() {
    let backend = Arc::new(InMemoryPersistence::new());
    let chat = SaveOptions {
        conversation_id: Some("chat-1".into()),
    };
    let first = binder_pipeline();
    let second = pipeline_from_yaml(
        r#"
name: "Fold only"
nodes:
  - id: "fold"
    type: "structure-prediction"
"#,
    );
    backend.save(&first, &chat).await.unwrap();
    backend.save(&second, &chat).await.unwrap();
    backend.save(&binder_pipeline(), &SaveOptions::default()).await.unwrap();

    let mut cache = PipelineCache::new(backend.clone());
    let report = cache
        .sync(&ListFilters {
            conversation_id: Some("chat-1".into()),
            full: false,
        })
        .await
        .unwrap();

    let mut hydrated = report.hydrated.clone();
    hydrated.sort();
    let mut expected = vec![first.id.clone(), second.id.clone()];
    expected.sort();
    assert_eq!(hydrated, expected);
    assert!(report.skipped.is_empty());
    assert_eq!(cache.len(), 2);

    let cached = cache.get(&first.id).unwrap();
    assert_eq!(cached.nodes().len(), 5);
    assert_eq!(cached.edges().len(), 5);
    assert!(!cache.is_dirty(&first.id));

    // Nothing changed remotely, so a second sync takes nothing
    let again = cache
        .sync(&ListFilters {
            conversation_id: Some("chat-1".into()),
            full: true,
        })
        .await
        .unwrap();
    assert!(again.updated.is_empty());
    assert!(again.hydrated.is_empty());
}

/// A local copy saved while the backend was down survives a sync
#[tokio::test(start_paused = true)]
async fn test_sync_keeps_newer_local_copy() {
    let backend = Arc::new(FlakyPersistence::new());
    let pipeline = binder_pipeline();
    let id = pipeline.id.clone();
    backend.save(&pipeline, &SaveOptions::default()).await.unwrap();

    let result = run_pipeline_with_mock(pipeline, Arc::new(MockExecutor::new())).await;
    assert_pipeline_completed(&result);

    let mut cache = PipelineCache::new(backend.clone());
    backend.set_failing(true);
    assert!(cache.save(result.pipeline.clone(), &SaveOptions::default()).await.is_err());
    assert!(cache.is_dirty(&id));

    let report = cache.sync(&ListFilters::default()).await.unwrap();
    assert_eq!(report.kept_local, vec![id.clone()]);
    assert_eq!(cache.get(&id).unwrap().status(), PipelineStatus::Completed);
    assert_eq!(
        cache.get(&id).unwrap().node("fold").unwrap().result_metadata(),
        Some(&json!({"script": "fold"}))
    );
}
