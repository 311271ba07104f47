use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of operations accepted in one sync request.
pub const MAX_SYNC_BATCH: usize = 50;

/// The mutation an offline operation stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateEntry,
    CreatePasture,
    DeletePasture,
    CreateHerd,
    DeleteHerd,
    UpdateProfile,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateEntry => "create_entry",
            OperationKind::CreatePasture => "create_pasture",
            OperationKind::DeletePasture => "delete_pasture",
            OperationKind::CreateHerd => "create_herd",
            OperationKind::DeleteHerd => "delete_herd",
            OperationKind::UpdateProfile => "update_profile",
        }
    }

    /// Create-type operations are the ones a duplicated replay can double-apply.
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            OperationKind::CreateEntry | OperationKind::CreatePasture | OperationKind::CreateHerd
        )
    }
}

/// A durable mutation intent recorded while offline.
///
/// `id` is generated on the client and is only used to match results back to
/// queued operations; the server does not deduplicate on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineOperation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub payload: serde_json::Value,
    /// Enqueue time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl OfflineOperation {
    pub fn new(kind: OperationKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            payload,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub operations: Vec<OfflineOperation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub results: Vec<OperationResult>,
}

/// Outcome of replaying a single operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResult {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}
