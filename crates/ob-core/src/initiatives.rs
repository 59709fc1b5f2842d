use crate::error::InitiativeError;
use crate::types::{
    CreateInitiativeInput, Initiative, InitiativeFilter, InitiativeId, UpdateInitiativeInput,
};

/// Initiatives returned by `get` and `list` carry their tasks and checklists.
pub trait InitiativeRepository {
    fn create(&self, input: CreateInitiativeInput) -> Result<Initiative, InitiativeError>;
    fn get(&self, id: &InitiativeId) -> Result<Option<Initiative>, InitiativeError>;
    fn list(&self, filter: InitiativeFilter) -> Result<Vec<Initiative>, InitiativeError>;
    fn update(
        &self,
        id: &InitiativeId,
        input: UpdateInitiativeInput,
    ) -> Result<Initiative, InitiativeError>;
    fn delete(&self, id: &InitiativeId) -> Result<(), InitiativeError>;
}
