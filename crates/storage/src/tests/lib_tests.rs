use super::*;
use serde_json::json;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn unwritten_slots_read_back_as_none() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage.current_config().await.expect("config").is_none());
    assert!(storage.current_state().await.expect("state").is_none());
    assert!(storage.modified_state().await.expect("modified").is_none());
    assert!(storage
        .current_project_details()
        .await
        .expect("details")
        .is_none());
}

#[tokio::test]
async fn config_and_state_slots_are_independent() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .set_current_config(&json!({"nodes": {"n1": {}}}))
        .await
        .expect("config write");
    storage
        .set_current_state(&json!({"nodes": {"n1": {"x": 10}}}))
        .await
        .expect("state write");

    assert_eq!(
        storage.current_config().await.expect("config"),
        Some(json!({"nodes": {"n1": {}}}))
    );
    assert_eq!(
        storage.current_state().await.expect("state"),
        Some(json!({"nodes": {"n1": {"x": 10}}}))
    );
}

#[tokio::test]
async fn slot_writes_are_last_write_wins() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .set_current_config(&json!({"a": 1}))
        .await
        .expect("first write");
    storage
        .set_current_config(&json!({"b": 2}))
        .await
        .expect("second write");

    assert_eq!(
        storage.current_config().await.expect("config"),
        Some(json!({"b": 2}))
    );
}

#[tokio::test]
async fn project_details_round_trip() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = ProjectId::new("p1");
    storage
        .set_current_project_details(&id, 3)
        .await
        .expect("details write");

    let details = storage
        .current_project_details()
        .await
        .expect("details read")
        .expect("details present");
    assert_eq!(details.id, id);
    assert_eq!(details.version, 3);
}

#[tokio::test]
async fn project_details_overwrite_replaces_identity() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .set_current_project_details(&ProjectId::new("p1"), 1)
        .await
        .expect("first write");
    storage
        .set_current_project_details(&ProjectId::new("p2"), 7)
        .await
        .expect("second write");

    let details = storage
        .current_project_details()
        .await
        .expect("details read")
        .expect("details present");
    assert_eq!(details.id, ProjectId::new("p2"));
    assert_eq!(details.version, 7);
}

#[tokio::test]
async fn clear_empties_every_slot() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .set_current_config(&json!({"a": 1}))
        .await
        .expect("config write");
    storage
        .set_modified_state(&json!({"b": 2}))
        .await
        .expect("modified write");
    storage
        .set_current_project_details(&ProjectId::new("p1"), 3)
        .await
        .expect("details write");

    storage.clear().await.expect("clear");

    assert!(storage.current_config().await.expect("config").is_none());
    assert!(storage.modified_state().await.expect("modified").is_none());
    assert!(storage
        .current_project_details()
        .await
        .expect("details")
        .is_none());
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("codegen_client_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("cache.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}
