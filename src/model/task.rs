use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::label::{Priority, Status, TaskType};

/// A board item normalized into the fields this tool filters, sorts, and edits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Task {
    /// Remote item ID, assigned by the service.
    pub id: String,
    /// Short per-board handle, assigned by the task store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, rename = "type")]
    pub kind: TaskType,
    #[serde(default)]
    pub sprint: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Anything that is not finished or dropped.
    pub fn is_active(&self) -> bool {
        let status = self.status.as_str().to_lowercase();
        !(status.contains("done") || status.contains("completed") || status.contains("removed"))
    }
}
