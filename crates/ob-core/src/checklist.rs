use crate::error::ChecklistError;
use crate::types::{
    ChecklistItem, ChecklistItemId, CreateChecklistItemInput, TaskId, UpdateChecklistItemInput,
};

pub trait ChecklistRepository {
    fn create(&self, input: CreateChecklistItemInput) -> Result<ChecklistItem, ChecklistError>;
    fn get(&self, id: &ChecklistItemId) -> Result<Option<ChecklistItem>, ChecklistError>;
    fn list_for_task(&self, task: &TaskId) -> Result<Vec<ChecklistItem>, ChecklistError>;
    fn update(
        &self,
        id: &ChecklistItemId,
        input: UpdateChecklistItemInput,
    ) -> Result<ChecklistItem, ChecklistError>;
    fn delete(&self, id: &ChecklistItemId) -> Result<(), ChecklistError>;
}
