use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ProjectId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateCodeRequest {
    pub project_id: ProjectId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateCodeResponse {
    pub project_id: ProjectId,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetProjectRequest {
    pub id: ProjectId,
}

/// Authoritative server-side snapshot of a project. `json` carries the full
/// diagram document (nodes, edges, tool configuration) as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetProjectResponse {
    pub id: ProjectId,
    pub version: i64,
    pub json: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Outcome of a remote call that produced an HTTP response. `data` is present
/// only when the body parsed as `T`; non-200 responses typically carry none.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: 200,
            data: Some(data),
        }
    }

    pub fn status_only(status: u16) -> Self {
        Self { status, data: None }
    }
}
