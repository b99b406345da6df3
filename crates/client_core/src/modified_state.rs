use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use shared::protocol::GetProjectResponse;
use storage::Storage;

/// Reconciles the `modified_state` cache slot with a freshly fetched project
/// snapshot. In-progress node/edge property edits live only in that slot; a
/// refresh that overwrote it wholesale would lose them across a logout/login
/// cycle.
#[async_trait]
pub trait StateReconciler: Send + Sync {
    async fn update_modified_state(&self, snapshot: &GetProjectResponse) -> Result<()>;
}

pub struct CachedStateReconciler {
    cache: Storage,
}

impl CachedStateReconciler {
    pub fn new(cache: Storage) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl StateReconciler for CachedStateReconciler {
    async fn update_modified_state(&self, snapshot: &GetProjectResponse) -> Result<()> {
        let previous = self
            .cache
            .modified_state()
            .await?
            .unwrap_or(Value::Object(Map::new()));
        let merged = merge_modified_state(&previous, &snapshot.json);
        self.cache.set_modified_state(&merged).await
    }
}

/// Start from the fetched snapshot and carry over locally edited node/edge
/// entries for every id the server still knows about. Ids absent from the
/// snapshot are dropped; ids new to it come in as fetched.
fn merge_modified_state(previous: &Value, fetched: &Value) -> Value {
    let mut merged = fetched.clone();
    let Some(merged_map) = merged.as_object_mut() else {
        return merged;
    };

    for section in ["nodes", "edges"] {
        let Some(previous_section) = previous.get(section).and_then(Value::as_object) else {
            continue;
        };
        let Some(fetched_section) = merged_map.get_mut(section).and_then(Value::as_object_mut)
        else {
            continue;
        };
        for (id, entry) in fetched_section.iter_mut() {
            if let Some(edited) = previous_section.get(id) {
                *entry = edited.clone();
            }
        }
    }

    merged
}

#[cfg(test)]
#[path = "tests/modified_state_tests.rs"]
mod tests;
