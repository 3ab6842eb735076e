//! Integration tests for `CheckpointStore`'s save/load/list/compact surface
//! across its step, session and loop namespaces.

use wavework::domain::models::CheckpointStoreConfig;
use wavework::services::CheckpointStore;

fn store(dir: &std::path::Path) -> CheckpointStore {
    CheckpointStore::new(CheckpointStoreConfig {
        checkpoints_dir: dir.to_string_lossy().to_string(),
        retention_days: 7,
        max_bytes: 1024 * 1024,
    })
}

#[tokio::test]
async fn save_then_load_round_trips_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    store.save("wave-1", &serde_json::json!({"completed": 3})).await.unwrap();
    let checkpoint = store.load::<serde_json::Value>("wave-1").await.unwrap();

    assert_eq!(checkpoint.state["completed"], 3);
}

#[tokio::test]
async fn load_missing_checkpoint_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let result = store.load::<serde_json::Value>("never-saved").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn list_returns_every_saved_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    store.save("wave-1", &serde_json::json!(1)).await.unwrap();
    store.save("wave-2", &serde_json::json!(2)).await.unwrap();

    let mut names = store.list().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["wave-1".to_string(), "wave-2".to_string()]);
}

#[tokio::test]
async fn session_and_loop_namespaces_are_independent_of_step_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    store.save_session("sess-1", &serde_json::json!({"status": "active"})).await.unwrap();
    store.save_loop("loop-1", &serde_json::json!({"current_iteration": 2})).await.unwrap();

    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(store.list_sessions(None).await.unwrap(), vec!["sess-1".to_string()]);
    assert_eq!(store.list_loops().await.unwrap(), vec!["loop-1".to_string()]);

    let loop_checkpoint = store.load_loop::<serde_json::Value>("loop-1").await.unwrap();
    assert_eq!(loop_checkpoint.state["current_iteration"], 2);
}

#[tokio::test]
async fn compact_steps_by_session_keeps_only_the_newest() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    for i in 0..5 {
        store.save_step("sess-1", &format!("step-{i}"), &serde_json::json!(i)).await.unwrap();
    }

    let removed = store.compact_steps_by_session("sess-1", 2).await.unwrap();

    assert_eq!(removed, 3);
    assert_eq!(store.list_steps_by_session("sess-1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn delete_loop_removes_it_from_the_listing() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    store.save_loop("loop-1", &serde_json::json!({})).await.unwrap();
    store.delete_loop("loop-1").await.unwrap();

    assert!(store.list_loops().await.unwrap().is_empty());
}
