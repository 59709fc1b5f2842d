use crate::types::enums::{JobStatus, Status};
use crate::types::ids::{ChecklistItemId, InitiativeId, TaskId, WorkspaceId};
use crate::types::io::{UpdateChecklistItemInput, UpdateInitiativeInput, UpdateTaskInput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// AI job result as returned by the job service.
///
/// Entries are kept as raw JSON so one malformed entry cannot fail the
/// whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiJobResult {
    pub status: JobStatus,
    #[serde(default)]
    pub result_data: Option<JobResultData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultData {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub managed_initiatives: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawManagedInitiative {
    pub action: Option<String>,
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<Status>,
    pub tasks: Option<Vec<Value>>,
    pub workspace_identifier: Option<String>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawManagedTask {
    pub action: Option<String>,
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<Status>,
    pub checklist: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawChecklistItem {
    pub action: Option<String>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub is_complete: Option<bool>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeDraft {
    pub workspace_identifier: WorkspaceId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<ChecklistDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistDraft {
    pub title: String,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub order: Option<i64>,
}

/// Proposed children of an updated entity.
///
/// In snapshot mode the list is the complete proposed child set, so live
/// children missing from it are proposed for deletion. Identifiers named by
/// skipped entries are in `kept` and are never proposed for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChange<T> {
    pub entries: Vec<T>,
    pub snapshot: bool,
    pub kept: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiativeChange {
    pub identifier: InitiativeId,
    pub patch: UpdateInitiativeInput,
    pub tasks: Option<ListChange<ManagedTask>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskChange {
    pub identifier: TaskId,
    pub patch: UpdateTaskInput,
    pub checklist: Option<ListChange<ManagedChecklistItem>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItemChange {
    pub id: ChecklistItemId,
    pub patch: UpdateChecklistItemInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedInitiative {
    Create(InitiativeDraft),
    Update(InitiativeChange),
    Delete { identifier: InitiativeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedTask {
    Create(TaskDraft),
    Update(TaskChange),
    Delete { identifier: TaskId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedChecklistItem {
    Create(ChecklistDraft),
    Update(ChecklistItemChange),
    Delete { id: ChecklistItemId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// JSON location of the entry, e.g. `managed_initiatives[2].tasks[0]`.
    pub location: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedJob {
    pub message: Option<String>,
    pub initiatives: Vec<ManagedInitiative>,
    pub skipped: Vec<SkippedEntry>,
}
