use std::{fs, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};

use shared::domain::ProjectId;

const SLOT_CURRENT_CONFIG: &str = "current_config";
const SLOT_CURRENT_STATE: &str = "current_state";
const SLOT_MODIFIED_STATE: &str = "modified_state";
const SLOT_CURRENT_PROJECT: &str = "current_project";

/// Session-scoped cache of the client's view of the active project. Each
/// slot is overwritten wholesale on every successful refresh; last write
/// wins, no partial merges.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Identity and version of the project the client currently has cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDetails {
    pub id: ProjectId,
    pub version: i64,
    pub cached_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_cache_table().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_cache_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS client_cache (
                slot        TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                updated_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure client_cache table exists")?;
        Ok(())
    }

    async fn write_slot(&self, slot: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO client_cache (slot, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(slot) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
        )
        .bind(slot)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write cache slot '{slot}'"))?;
        Ok(())
    }

    async fn read_slot(&self, slot: &str) -> Result<Option<(String, DateTime<Utc>)>> {
        let row = sqlx::query("SELECT value, updated_at FROM client_cache WHERE slot = ?")
            .bind(slot)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read cache slot '{slot}'"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let value: String = row.try_get("value")?;
        let updated_at: String = row.try_get("updated_at")?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Ok(Some((value, updated_at)))
    }

    async fn write_json_slot(&self, slot: &str, value: &serde_json::Value) -> Result<()> {
        self.write_slot(slot, &serde_json::to_string(value)?).await
    }

    async fn read_json_slot(&self, slot: &str) -> Result<Option<serde_json::Value>> {
        let Some((raw, _)) = self.read_slot(slot).await? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("cache slot '{slot}' holds invalid json"))?;
        Ok(Some(value))
    }

    pub async fn set_current_config(&self, config: &serde_json::Value) -> Result<()> {
        self.write_json_slot(SLOT_CURRENT_CONFIG, config).await
    }

    pub async fn current_config(&self) -> Result<Option<serde_json::Value>> {
        self.read_json_slot(SLOT_CURRENT_CONFIG).await
    }

    pub async fn set_current_state(&self, state: &serde_json::Value) -> Result<()> {
        self.write_json_slot(SLOT_CURRENT_STATE, state).await
    }

    pub async fn current_state(&self) -> Result<Option<serde_json::Value>> {
        self.read_json_slot(SLOT_CURRENT_STATE).await
    }

    pub async fn set_modified_state(&self, state: &serde_json::Value) -> Result<()> {
        self.write_json_slot(SLOT_MODIFIED_STATE, state).await
    }

    pub async fn modified_state(&self) -> Result<Option<serde_json::Value>> {
        self.read_json_slot(SLOT_MODIFIED_STATE).await
    }

    pub async fn set_current_project_details(&self, id: &ProjectId, version: i64) -> Result<()> {
        let value = serde_json::json!({
            "id": id.as_str(),
            "version": version,
        });
        self.write_json_slot(SLOT_CURRENT_PROJECT, &value).await
    }

    pub async fn current_project_details(&self) -> Result<Option<ProjectDetails>> {
        let Some((raw, updated_at)) = self.read_slot(SLOT_CURRENT_PROJECT).await? else {
            return Ok(None);
        };
        let value: serde_json::Value =
            serde_json::from_str(&raw).context("current_project slot holds invalid json")?;
        let id = value
            .get("id")
            .and_then(|v| v.as_str())
            .context("current_project slot missing id")?;
        let version = value
            .get("version")
            .and_then(|v| v.as_i64())
            .context("current_project slot missing version")?;
        Ok(Some(ProjectDetails {
            id: ProjectId::new(id),
            version,
            cached_at: updated_at,
        }))
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM client_cache")
            .execute(&self.pool)
            .await
            .context("failed to clear client cache")?;
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(PathBuf::from(path))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
