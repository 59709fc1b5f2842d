use crate::error::TaskError;
use crate::types::{CreateTaskInput, InitiativeId, Task, TaskId, UpdateTaskInput};

pub trait TaskRepository {
    fn create(&self, input: CreateTaskInput) -> Result<Task, TaskError>;
    fn get(&self, id: &TaskId) -> Result<Option<Task>, TaskError>;
    fn list_for_initiative(&self, initiative: &InitiativeId) -> Result<Vec<Task>, TaskError>;
    fn update(&self, id: &TaskId, input: UpdateTaskInput) -> Result<Task, TaskError>;
    fn delete(&self, id: &TaskId) -> Result<(), TaskError>;
}
