pub mod entity;
pub mod enums;
pub mod event;
pub mod ids;
pub mod io;
pub mod job;
pub mod suggestion;

pub use entity::{ChecklistItem, Initiative, Task};
pub use enums::{Action, EntityKind, Field, JobStatus, Status, SuggestionKind};
pub use event::{BulkDecision, EventBody};
pub use ids::{
    ChecklistItemId, DraftKey, EntityKey, EntityRef, IdError, InitiativeId, TaskId, WorkspaceId,
};
pub use io::{
    CreateChecklistItemInput, CreateInitiativeInput, CreateTaskInput, InitiativeFilter,
    UpdateChecklistItemInput, UpdateInitiativeInput, UpdateTaskInput,
};
pub use job::{
    AiJobResult, ChecklistDraft, ChecklistItemChange, InitiativeChange, InitiativeDraft,
    JobResultData, ListChange, ManagedChecklistItem, ManagedInitiative, ManagedTask, ParsedJob,
    SkippedEntry, TaskChange, TaskDraft,
};
pub use suggestion::{Change, ResolutionState, ResolutionSummary, Suggestion};
