//! Parsing of AI job results into typed proposals.
//!
//! Entries are decoded one at a time. A malformed entry is recorded as a
//! [`SkippedEntry`] and logged; the remaining entries are still used.

use crate::error::{EntryError, JobError};
use crate::types::job::{RawChecklistItem, RawManagedInitiative, RawManagedTask};
use crate::types::{
    Action, AiJobResult, ChecklistDraft, ChecklistItemChange, ChecklistItemId, InitiativeChange,
    InitiativeDraft, InitiativeId, JobStatus, ListChange, ManagedChecklistItem, ManagedInitiative,
    ManagedTask, ParsedJob, SkippedEntry, TaskChange, TaskDraft, TaskId, UpdateChecklistItemInput,
    UpdateInitiativeInput, UpdateTaskInput, WorkspaceId,
};
use crate::validation::normalize_title;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::str::FromStr;

pub fn parse_job_str(json: &str) -> Result<AiJobResult, JobError> {
    serde_json::from_str(json).map_err(|err| JobError::Malformed {
        message: err.to_string(),
    })
}

/// Hex SHA-256 of the job result's canonical JSON encoding.
pub fn job_digest(job: &AiJobResult) -> String {
    let bytes = serde_json::to_vec(job).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

pub fn parse_job(job: &AiJobResult) -> Result<ParsedJob, JobError> {
    if job.status != JobStatus::Completed {
        return Err(JobError::NotCompleted { status: job.status });
    }
    let Some(data) = &job.result_data else {
        return Err(JobError::MissingResultData);
    };

    let mut skipped = Vec::new();
    let mut initiatives = Vec::new();
    for (index, value) in data.managed_initiatives.iter().enumerate() {
        let location = format!("managed_initiatives[{index}]");
        match parse_initiative(value, &location, &mut skipped) {
            Ok(initiative) => initiatives.push(initiative),
            Err(err) => skip(&mut skipped, location, &err),
        }
    }

    Ok(ParsedJob {
        message: data.message.clone(),
        initiatives,
        skipped,
    })
}

pub(crate) fn skip(skipped: &mut Vec<SkippedEntry>, location: String, err: &EntryError) {
    tracing::warn!(location = %location, reason = %err, "skipping job entry");
    skipped.push(SkippedEntry {
        location,
        reason: err.to_string(),
    });
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, EntryError> {
    serde_json::from_value(value.clone()).map_err(|err| EntryError::Malformed {
        message: err.to_string(),
    })
}

fn parse_action(action: Option<&str>) -> Result<Action, EntryError> {
    let Some(action) = action else {
        return Err(EntryError::MissingAction);
    };
    Action::from_str(action).map_err(|err| EntryError::UnknownAction { action: err.0 })
}

fn parse_id<T>(value: Option<String>, field: &'static str) -> Result<T, EntryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = value else {
        return Err(EntryError::MissingField { field });
    };
    T::from_str(value.trim()).map_err(|err| EntryError::InvalidIdentifier {
        message: err.to_string(),
    })
}

fn require_title(title: Option<&str>) -> Result<String, EntryError> {
    title
        .and_then(normalize_title)
        .ok_or(EntryError::MissingField { field: "title" })
}

/// A list is a snapshot when none of its entries names an action.
fn is_snapshot(values: &[Value]) -> bool {
    !values.is_empty()
        && values
            .iter()
            .all(|value| value.get("action").is_none_or(Value::is_null))
}

fn collect_entries<T, F>(
    values: &[Value],
    location: &str,
    collection: &str,
    skipped: &mut Vec<SkippedEntry>,
    mut parse: F,
) -> Vec<T>
where
    F: FnMut(&Value, &str, &mut Vec<SkippedEntry>) -> Result<T, EntryError>,
{
    let mut entries = Vec::new();
    for (index, value) in values.iter().enumerate() {
        let entry_location = format!("{location}.{collection}[{index}]");
        match parse(value, &entry_location, skipped) {
            Ok(entry) => entries.push(entry),
            Err(err) => skip(skipped, entry_location, &err),
        }
    }
    entries
}

/// Collects a nested list of an updated entity.
///
/// A skipped entry still names a live child, so its identifier is kept out
/// of snapshot deletes. When a skipped entry carries an identifier that is
/// not a string, the list stops being treated as a snapshot.
fn collect_list<T, F>(
    values: &[Value],
    location: &str,
    collection: &str,
    id_key: &str,
    skipped: &mut Vec<SkippedEntry>,
    parse: F,
) -> ListChange<T>
where
    F: FnMut(&Value, &str, &mut Vec<SkippedEntry>) -> Result<T, EntryError>,
{
    let before = skipped.len();
    let entries = collect_entries(values, location, collection, skipped, parse);
    let mut snapshot = is_snapshot(values);
    let mut kept = BTreeSet::new();
    if skipped.len() > before {
        let prefix = format!("{location}.{collection}[");
        for (index, value) in values.iter().enumerate() {
            let entry_location = format!("{prefix}{index}]");
            if !skipped.iter().skip(before).any(|entry| entry.location == entry_location) {
                continue;
            }
            match value.get(id_key) {
                None | Some(Value::Null) => {}
                Some(Value::String(id)) => {
                    kept.insert(id.trim().to_string());
                }
                Some(_) => snapshot = false,
            }
        }
    }
    ListChange {
        entries,
        snapshot,
        kept,
    }
}

fn parse_initiative(
    value: &Value,
    location: &str,
    skipped: &mut Vec<SkippedEntry>,
) -> Result<ManagedInitiative, EntryError> {
    let raw: RawManagedInitiative = decode(value)?;
    match parse_action(raw.action.as_deref())? {
        Action::Create => {
            if raw.identifier.is_some() {
                return Err(EntryError::UnexpectedIdentifier);
            }
            let workspace_identifier: WorkspaceId =
                parse_id(raw.workspace_identifier, "workspace_identifier")?;
            let title = require_title(raw.title.as_deref())?;
            let tasks = match &raw.tasks {
                Some(values) => collect_entries(values, location, "tasks", skipped, parse_task_draft),
                None => Vec::new(),
            };
            Ok(ManagedInitiative::Create(InitiativeDraft {
                workspace_identifier,
                title,
                description: raw.description.unwrap_or_default(),
                kind: raw.kind,
                status: raw.status,
                order: raw.order,
                tasks,
            }))
        }
        Action::Update => {
            let identifier: InitiativeId = parse_id(raw.identifier, "identifier")?;
            let patch = UpdateInitiativeInput {
                title: raw.title.as_deref().and_then(normalize_title),
                description: raw.description,
                kind: raw.kind,
                status: raw.status,
            };
            let tasks = raw
                .tasks
                .as_ref()
                .map(|values| collect_list(values, location, "tasks", "identifier", skipped, parse_task));
            Ok(ManagedInitiative::Update(InitiativeChange {
                identifier,
                patch,
                tasks,
            }))
        }
        Action::Delete => Ok(ManagedInitiative::Delete {
            identifier: parse_id(raw.identifier, "identifier")?,
        }),
    }
}

/// Task nested in an initiative CREATE: only creates are meaningful there.
fn parse_task_draft(
    value: &Value,
    location: &str,
    skipped: &mut Vec<SkippedEntry>,
) -> Result<TaskDraft, EntryError> {
    let raw: RawManagedTask = decode(value)?;
    if let Some(action) = raw.action.as_deref() {
        let action = parse_action(Some(action))?;
        if action != Action::Create {
            return Err(EntryError::UnknownAction {
                action: format!("{action} inside a created initiative"),
            });
        }
    }
    if raw.identifier.is_some() {
        return Err(EntryError::UnexpectedIdentifier);
    }
    let title = require_title(raw.title.as_deref())?;
    let checklist = match &raw.checklist {
        Some(values) => collect_entries(values, location, "checklist", skipped, |value, _, _| {
            parse_checklist_draft(value)
        }),
        None => Vec::new(),
    };
    Ok(TaskDraft {
        title,
        description: raw.description.unwrap_or_default(),
        kind: raw.kind,
        status: raw.status,
        checklist,
    })
}

fn parse_task(
    value: &Value,
    location: &str,
    skipped: &mut Vec<SkippedEntry>,
) -> Result<ManagedTask, EntryError> {
    let raw: RawManagedTask = decode(value)?;
    let action = match raw.action.as_deref() {
        Some(action) => parse_action(Some(action))?,
        None if raw.identifier.is_some() => Action::Update,
        None => Action::Create,
    };
    match action {
        Action::Create => parse_task_draft(value, location, skipped).map(ManagedTask::Create),
        Action::Update => {
            let identifier: TaskId = parse_id(raw.identifier, "identifier")?;
            let patch = UpdateTaskInput {
                title: raw.title.as_deref().and_then(normalize_title),
                description: raw.description,
                kind: raw.kind,
                status: raw.status,
            };
            let checklist = raw.checklist.as_ref().map(|values| {
                collect_list(values, location, "checklist", "id", skipped, |value, _, _| {
                    parse_checklist_item(value)
                })
            });
            Ok(ManagedTask::Update(TaskChange {
                identifier,
                patch,
                checklist,
            }))
        }
        Action::Delete => Ok(ManagedTask::Delete {
            identifier: parse_id(raw.identifier, "identifier")?,
        }),
    }
}

fn parse_checklist_draft(value: &Value) -> Result<ChecklistDraft, EntryError> {
    let raw: RawChecklistItem = decode(value)?;
    if let Some(action) = raw.action.as_deref() {
        let action = parse_action(Some(action))?;
        if action != Action::Create {
            return Err(EntryError::UnknownAction {
                action: format!("{action} inside a created task"),
            });
        }
    }
    if raw.id.is_some() {
        return Err(EntryError::UnexpectedIdentifier);
    }
    Ok(ChecklistDraft {
        title: require_title(raw.title.as_deref())?,
        is_complete: raw.is_complete.unwrap_or(false),
        order: raw.order,
    })
}

fn parse_checklist_item(value: &Value) -> Result<ManagedChecklistItem, EntryError> {
    let raw: RawChecklistItem = decode(value)?;
    let action = match raw.action.as_deref() {
        Some(action) => parse_action(Some(action))?,
        None if raw.id.is_some() => Action::Update,
        None => Action::Create,
    };
    match action {
        Action::Create => parse_checklist_draft(value).map(ManagedChecklistItem::Create),
        Action::Update => {
            let id: ChecklistItemId = parse_id(raw.id, "id")?;
            Ok(ManagedChecklistItem::Update(ChecklistItemChange {
                id,
                patch: UpdateChecklistItemInput {
                    title: raw.title.as_deref().and_then(normalize_title),
                    is_complete: raw.is_complete,
                },
            }))
        }
        Action::Delete => Ok(ManagedChecklistItem::Delete {
            id: parse_id(raw.id, "id")?,
        }),
    }
}
