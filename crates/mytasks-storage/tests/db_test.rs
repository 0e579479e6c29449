//! Integration tests for the turso-backed store
//!
//! Runs the shared store behaviour against an on-disk database, plus the
//! checks that only make sense with a real file:
//! - Reopening keeps data
//! - Concurrent creates get distinct positions

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::*;
use mytasks_core::{Priority, Task};
use mytasks_storage::{OpContext, SqliteStore, Store, StoreConfig};
use tempfile::TempDir;

/// Helper to create a temporary database for testing
async fn create_test_store() -> (SqliteStore, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = SqliteStore::open(StoreConfig::new(dir.path().join("mytasks.db")))
        .await
        .expect("Failed to open store");
    (store, dir)
}

#[tokio::test]
async fn test_fresh_file_accepts_project_and_task() {
    let (store, _dir) = create_test_store().await;
    let cx = OpContext::background();

    let project = add_project(&store, "First").await;
    let task = add_task(&store, project.id, "first task").await;

    assert_eq!(task.project_id, project.id);
    assert_eq!(task.sort_order, 1);
    assert_eq!(store.get_task(&cx, task.id).await.unwrap().description, "first task");
}

#[tokio::test]
async fn test_task_under_missing_project_is_not_found() {
    for foreign_keys in [true, false] {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            foreign_keys,
            ..StoreConfig::new(dir.path().join("mytasks.db"))
        };
        let store = SqliteStore::open(config).await.unwrap();
        let cx = OpContext::background();

        let err = store
            .create_task(&cx, &Task::new(77, "orphan", Priority::Low))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "foreign_keys={}: {}", foreign_keys, err);
        assert!(store
            .list_tasks_by_project(&cx, 77, 0)
            .await
            .unwrap()
            .is_empty());

        // The failed create leaves the connection ready for the next write.
        let project = add_project(&store, "Real").await;
        assert_eq!(add_task(&store, project.id, "kept").await.sort_order, 1);
    }
}

#[tokio::test]
async fn test_project_crud() {
    let (store, _dir) = create_test_store().await;
    project_crud(&store).await;
}

#[tokio::test]
async fn test_missing_rows_are_not_found() {
    let (store, _dir) = create_test_store().await;
    missing_rows_are_not_found(&store).await;
}

#[tokio::test]
async fn test_sort_order_appends_and_reorders() {
    let (store, _dir) = create_test_store().await;
    sort_order_appends_and_reorders(&store).await;
}

#[tokio::test]
async fn test_reorder_projects() {
    let (store, _dir) = create_test_store().await;
    reorder_projects(&store).await;
}

#[tokio::test]
async fn test_reorder_is_lenient() {
    let (store, _dir) = create_test_store().await;
    reorder_is_lenient(&store).await;
}

#[tokio::test]
async fn test_delete_project_cascades() {
    let (store, _dir) = create_test_store().await;
    delete_project_cascades(&store).await;
}

#[tokio::test]
async fn test_toggle_twice_restores() {
    let (store, _dir) = create_test_store().await;
    toggle_twice_restores(&store).await;
}

#[tokio::test]
async fn test_update_task_completion_rules() {
    let (store, _dir) = create_test_store().await;
    update_task_completion_rules(&store).await;
}

#[tokio::test]
async fn test_project_completion() {
    let (store, _dir) = create_test_store().await;
    project_completion(&store).await;
}

#[tokio::test]
async fn test_filtered_listing_and_limits() {
    let (store, _dir) = create_test_store().await;
    filtered_listing_and_limits(&store).await;
}

#[tokio::test]
async fn test_task_fields_round_trip() {
    let (store, _dir) = create_test_store().await;
    task_fields_round_trip(&store).await;
}

#[tokio::test]
async fn test_expired_deadline_writes_nothing() {
    let (store, _dir) = create_test_store().await;
    expired_deadline_writes_nothing(&store).await;
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (store, _dir) = create_test_store().await;
    close_is_idempotent(&store).await;
}

#[tokio::test]
async fn test_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("mytasks.db");

    let store = SqliteStore::open_path(&path).await.unwrap();
    let project = add_project(&store, "Persistent").await;
    let task = add_task(&store, project.id, "survives restart").await;
    store.close().await.unwrap();
    drop(store);

    let store = SqliteStore::open_path(&path).await.unwrap();
    let cx = OpContext::background();
    assert_eq!(store.schema_version(&cx).await.unwrap(), 4);
    assert_eq!(
        store.get_task(&cx, task.id).await.unwrap().description,
        "survives restart"
    );
    assert_eq!(add_task(&store, project.id, "next").await.sort_order, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_distinct_positions() {
    let (store, _dir) = create_test_store().await;
    let store = Arc::new(store);
    let project = add_project(&*store, "Busy").await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let task = Task::new(project.id, format!("task {}", i), Priority::Medium);
            store.create_task(&OpContext::background(), &task).await
        }));
    }

    let mut positions = HashSet::new();
    for handle in handles {
        let task = handle.await.unwrap().unwrap();
        assert!(positions.insert(task.sort_order));
    }
    assert_eq!(positions, (1..=20).collect::<HashSet<i64>>());
}
