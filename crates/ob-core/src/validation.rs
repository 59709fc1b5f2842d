use crate::error::{ChecklistError, InitiativeError, TaskError};
use crate::types::{
    CreateChecklistItemInput, CreateInitiativeInput, CreateTaskInput, UpdateChecklistItemInput,
    UpdateInitiativeInput, UpdateTaskInput,
};

pub const MAX_TITLE_LEN: usize = 200;

/// Trimmed title, or `None` when nothing is left.
pub fn normalize_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn title_problem(title: &str) -> Option<String> {
    if title.trim().is_empty() {
        return Some("title must not be empty".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Some(format!("title longer than {MAX_TITLE_LEN} characters"));
    }
    None
}

pub fn validate_create_initiative(input: &CreateInitiativeInput) -> Result<(), InitiativeError> {
    match title_problem(&input.title) {
        Some(message) => Err(InitiativeError::InvalidInput { message }),
        None => Ok(()),
    }
}

pub fn validate_update_initiative(input: &UpdateInitiativeInput) -> Result<(), InitiativeError> {
    match input.title.as_deref().and_then(title_problem) {
        Some(message) => Err(InitiativeError::InvalidInput { message }),
        None => Ok(()),
    }
}

pub fn validate_create_task(input: &CreateTaskInput) -> Result<(), TaskError> {
    match title_problem(&input.title) {
        Some(message) => Err(TaskError::InvalidInput { message }),
        None => Ok(()),
    }
}

pub fn validate_update_task(input: &UpdateTaskInput) -> Result<(), TaskError> {
    match input.title.as_deref().and_then(title_problem) {
        Some(message) => Err(TaskError::InvalidInput { message }),
        None => Ok(()),
    }
}

pub fn validate_create_checklist_item(
    input: &CreateChecklistItemInput,
) -> Result<(), ChecklistError> {
    match title_problem(&input.title) {
        Some(message) => Err(ChecklistError::InvalidInput { message }),
        None => Ok(()),
    }
}

pub fn validate_update_checklist_item(
    input: &UpdateChecklistItemInput,
) -> Result<(), ChecklistError> {
    match input.title.as_deref().and_then(title_problem) {
        Some(message) => Err(ChecklistError::InvalidInput { message }),
        None => Ok(()),
    }
}
