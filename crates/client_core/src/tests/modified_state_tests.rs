use super::*;
use serde_json::json;
use shared::domain::ProjectId;

fn snapshot_with(json: serde_json::Value) -> GetProjectResponse {
    GetProjectResponse {
        id: ProjectId::new("p1"),
        version: 3,
        json,
        updated_at: None,
    }
}

#[test]
fn keeps_locally_edited_entries_for_surviving_ids() {
    let previous = json!({
        "nodes": {"n1": {"language": "rust", "port": 8080}},
        "edges": {"e1": {"src": "n1", "dest": "n2", "protocol": "grpc"}},
    });
    let fetched = json!({
        "nodes": {"n1": {"language": "rust"}, "n2": {"language": "go"}},
        "edges": {"e1": {"src": "n1", "dest": "n2"}},
    });

    let merged = merge_modified_state(&previous, &fetched);

    assert_eq!(
        merged["nodes"]["n1"],
        json!({"language": "rust", "port": 8080})
    );
    assert_eq!(merged["nodes"]["n2"], json!({"language": "go"}));
    assert_eq!(
        merged["edges"]["e1"],
        json!({"src": "n1", "dest": "n2", "protocol": "grpc"})
    );
}

#[test]
fn drops_entries_the_server_deleted() {
    let previous = json!({
        "nodes": {"n1": {"port": 8080}, "n9": {"port": 9090}},
    });
    let fetched = json!({
        "nodes": {"n1": {}},
    });

    let merged = merge_modified_state(&previous, &fetched);

    assert_eq!(merged["nodes"]["n1"], json!({"port": 8080}));
    assert!(merged["nodes"].get("n9").is_none());
}

#[test]
fn copies_non_diagram_keys_from_the_snapshot() {
    let previous = json!({"nodes": {}});
    let fetched = json!({
        "nodes": {},
        "edges": {},
        "tool": {"name": "scaffold", "version": "1.2"},
    });

    let merged = merge_modified_state(&previous, &fetched);
    assert_eq!(merged["tool"], json!({"name": "scaffold", "version": "1.2"}));
}

#[test]
fn passes_non_object_snapshots_through() {
    let previous = json!({"nodes": {"n1": {"port": 1}}});
    let fetched = json!([1, 2, 3]);

    assert_eq!(merge_modified_state(&previous, &fetched), json!([1, 2, 3]));
}

#[tokio::test]
async fn reconciler_persists_the_merged_document() {
    let cache = storage::Storage::new("sqlite::memory:").await.expect("db");
    cache
        .set_modified_state(&json!({"nodes": {"n1": {"port": 8080}}}))
        .await
        .expect("seed modified state");

    let reconciler = CachedStateReconciler::new(cache.clone());
    reconciler
        .update_modified_state(&snapshot_with(json!({
            "nodes": {"n1": {}, "n2": {"language": "go"}},
        })))
        .await
        .expect("reconcile");

    assert_eq!(
        cache.modified_state().await.expect("modified"),
        Some(json!({
            "nodes": {"n1": {"port": 8080}, "n2": {"language": "go"}},
        }))
    );
}

#[tokio::test]
async fn reconciler_starts_from_empty_state_on_first_fetch() {
    let cache = storage::Storage::new("sqlite::memory:").await.expect("db");

    let reconciler = CachedStateReconciler::new(cache.clone());
    reconciler
        .update_modified_state(&snapshot_with(json!({"nodes": {"n1": {}}})))
        .await
        .expect("reconcile");

    assert_eq!(
        cache.modified_state().await.expect("modified"),
        Some(json!({"nodes": {"n1": {}}}))
    );
}
