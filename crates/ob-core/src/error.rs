use crate::types::JobStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitiativeError {
    #[error("initiative not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found")]
    NotFound,
    #[error("parent initiative not found")]
    InitiativeNotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error("checklist item not found")]
    NotFound,
    #[error("parent task not found")]
    TaskNotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

/// Whole-job failures. Problems with single entries are skipped instead.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job is not completed (status {status:?})")]
    NotCompleted { status: JobStatus },
    #[error("job result has no result_data")]
    MissingResultData,
    #[error("job result is not valid json: {message}")]
    Malformed { message: String },
}

/// Reasons a single managed entry is skipped during parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("malformed entry: {message}")]
    Malformed { message: String },
    #[error("missing action")]
    MissingAction,
    #[error("unknown action: {action}")]
    UnknownAction { action: String },
    #[error("missing field: {field}")]
    MissingField { field: &'static str },
    #[error("create entries must not carry an identifier")]
    UnexpectedIdentifier,
    #[error("invalid identifier: {message}")]
    InvalidIdentifier { message: String },
    #[error("duplicate proposal for {path}")]
    Duplicate { path: String },
}

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("a save is already in progress")]
    SaveInProgress,
    #[error("no save is in progress")]
    NotSaving,
    #[error("{} suggestion(s) are unresolved", paths.len())]
    Unresolved { paths: Vec<String> },
    #[error("invalid snapshot: {message}")]
    InvalidSnapshot { message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

#[derive(Debug, Error)]
pub enum BacklogError {
    #[error(transparent)]
    Initiative(#[from] InitiativeError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Checklist(#[from] ChecklistError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Suggestion(#[from] SuggestionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl BacklogError {
    /// True when the error means the targeted entity (or its parent) no
    /// longer exists in the store.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Initiative(InitiativeError::NotFound)
                | Self::Task(TaskError::NotFound | TaskError::InitiativeNotFound)
                | Self::Checklist(ChecklistError::NotFound | ChecklistError::TaskNotFound)
        )
    }
}
