use crate::types::enums::Status;
use crate::types::ids::{ChecklistItemId, InitiativeId, TaskId, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiative {
    pub identifier: InitiativeId,
    pub workspace_identifier: WorkspaceId,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Status,
    pub order: i64,
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub identifier: TaskId,
    pub initiative_identifier: InitiativeId,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: ChecklistItemId,
    pub task_identifier: TaskId,
    pub title: String,
    pub is_complete: bool,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Initiative {
    pub fn task(&self, identifier: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.identifier == identifier)
    }
}

impl Task {
    pub fn checklist_item(&self, id: &ChecklistItemId) -> Option<&ChecklistItem> {
        self.checklist.iter().find(|item| &item.id == id)
    }
}
