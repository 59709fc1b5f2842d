//! In-memory store that records every write, for unit tests.

use crate::checklist::ChecklistRepository;
use crate::error::{BacklogError, ChecklistError, InitiativeError, TaskError};
use crate::initiatives::InitiativeRepository;
use crate::store::Store;
use crate::tasks::TaskRepository;
use crate::types::{
    AiJobResult, ChecklistItem, ChecklistItemId, CreateChecklistItemInput, CreateInitiativeInput,
    CreateTaskInput, Initiative, InitiativeFilter, InitiativeId, Status, Task, TaskId,
    UpdateChecklistItemInput, UpdateInitiativeInput, UpdateTaskInput, WorkspaceId,
};
use crate::validation::{
    validate_create_checklist_item, validate_create_initiative, validate_create_task,
    validate_update_checklist_item, validate_update_initiative, validate_update_task,
};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::cell::RefCell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateInitiative(String),
    UpdateInitiative(String, UpdateInitiativeInput),
    DeleteInitiative(String),
    CreateTask(String, String),
    UpdateTask(String, UpdateTaskInput),
    DeleteTask(String),
    CreateChecklistItem(String, String),
    UpdateChecklistItem(String, UpdateChecklistItemInput),
    DeleteChecklistItem(String),
}

#[derive(Debug, Default)]
pub struct RecordingStore {
    initiatives: RefCell<Vec<Initiative>>,
    calls: RefCell<Vec<Call>>,
    failing_titles: RefCell<Vec<String>>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

pub fn initiative(id: &str, title: &str, tasks: Vec<Task>) -> Initiative {
    Initiative {
        identifier: InitiativeId::new(id.to_string()).unwrap(),
        workspace_identifier: WorkspaceId::new("ws-1".to_string()).unwrap(),
        title: title.to_string(),
        description: String::new(),
        kind: None,
        status: Status::ToDo,
        order: 0,
        tasks,
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn task(id: &str, initiative: &str, title: &str) -> Task {
    Task {
        identifier: TaskId::new(id.to_string()).unwrap(),
        initiative_identifier: InitiativeId::new(initiative.to_string()).unwrap(),
        title: title.to_string(),
        description: String::new(),
        kind: None,
        status: Status::ToDo,
        checklist: Vec::new(),
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn checklist_item(task: &str, title: &str) -> ChecklistItem {
    ChecklistItem {
        id: ChecklistItemId::generate(),
        task_identifier: TaskId::new(task.to_string()).unwrap(),
        title: title.to_string(),
        is_complete: false,
        order: 0,
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn job(entries: Value) -> AiJobResult {
    serde_json::from_value(json!({
        "status": "COMPLETED",
        "result_data": {"message": "suggested changes", "managed_initiatives": entries}
    }))
    .unwrap()
}

fn next_number<'a>(ids: impl Iterator<Item = &'a str>, prefix: &str) -> i64 {
    ids.filter_map(|id| id.strip_prefix(prefix)?.parse::<i64>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

impl RecordingStore {
    pub fn with_initiatives(initiatives: Vec<Initiative>) -> Self {
        Self {
            initiatives: RefCell::new(initiatives),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Vec<Initiative> {
        self.initiatives.borrow().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Makes every create with this title fail.
    pub fn fail_title(&self, title: &str) {
        self.failing_titles.borrow_mut().push(title.to_string());
    }

    pub fn heal(&self) {
        self.failing_titles.borrow_mut().clear();
    }

    /// Deletes an initiative behind the session's back.
    pub fn remove_initiative(&self, id: &str) {
        self.initiatives
            .borrow_mut()
            .retain(|initiative| initiative.identifier.as_str() != id);
    }

    fn fails(&self, title: &str) -> bool {
        self.failing_titles.borrow().iter().any(|t| t == title)
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn with_task<T>(&self, id: &TaskId, f: impl FnOnce(&mut Task) -> T) -> Option<T> {
        let mut initiatives = self.initiatives.borrow_mut();
        initiatives
            .iter_mut()
            .flat_map(|initiative| initiative.tasks.iter_mut())
            .find(|task| &task.identifier == id)
            .map(f)
    }
}

impl InitiativeRepository for &RecordingStore {
    fn create(&self, input: CreateInitiativeInput) -> Result<Initiative, InitiativeError> {
        validate_create_initiative(&input)?;
        if self.fails(&input.title) {
            return Err(InitiativeError::Conflict {
                message: format!("refusing {}", input.title),
            });
        }
        let mut initiatives = self.initiatives.borrow_mut();
        let number = next_number(
            initiatives.iter().map(|i| i.identifier.as_str()),
            InitiativeId::PREFIX,
        );
        let mut created = initiative(&format!("I-{number}"), &input.title, Vec::new());
        created.workspace_identifier = input.workspace_identifier;
        created.description = input.description;
        created.kind = input.kind;
        created.status = input.status.unwrap_or_default();
        created.order = input.order.unwrap_or(0);
        initiatives.push(created.clone());
        self.record(Call::CreateInitiative(input.title));
        Ok(created)
    }

    fn get(&self, id: &InitiativeId) -> Result<Option<Initiative>, InitiativeError> {
        Ok(self
            .initiatives
            .borrow()
            .iter()
            .find(|initiative| &initiative.identifier == id)
            .cloned())
    }

    fn list(&self, filter: InitiativeFilter) -> Result<Vec<Initiative>, InitiativeError> {
        Ok(self
            .initiatives
            .borrow()
            .iter()
            .filter(|initiative| {
                filter
                    .workspace_identifier
                    .as_ref()
                    .is_none_or(|ws| &initiative.workspace_identifier == ws)
            })
            .cloned()
            .collect())
    }

    fn update(
        &self,
        id: &InitiativeId,
        input: UpdateInitiativeInput,
    ) -> Result<Initiative, InitiativeError> {
        validate_update_initiative(&input)?;
        let mut initiatives = self.initiatives.borrow_mut();
        let found = initiatives
            .iter_mut()
            .find(|initiative| &initiative.identifier == id)
            .ok_or(InitiativeError::NotFound)?;
        if let Some(title) = &input.title {
            found.title.clone_from(title);
        }
        if let Some(description) = &input.description {
            found.description.clone_from(description);
        }
        if input.kind.is_some() {
            found.kind.clone_from(&input.kind);
        }
        if let Some(status) = input.status {
            found.status = status;
        }
        let updated = found.clone();
        drop(initiatives);
        self.record(Call::UpdateInitiative(id.to_string(), input));
        Ok(updated)
    }

    fn delete(&self, id: &InitiativeId) -> Result<(), InitiativeError> {
        let mut initiatives = self.initiatives.borrow_mut();
        let index = initiatives
            .iter()
            .position(|initiative| &initiative.identifier == id)
            .ok_or(InitiativeError::NotFound)?;
        initiatives.remove(index);
        drop(initiatives);
        self.record(Call::DeleteInitiative(id.to_string()));
        Ok(())
    }
}

impl TaskRepository for &RecordingStore {
    fn create(&self, input: CreateTaskInput) -> Result<Task, TaskError> {
        validate_create_task(&input)?;
        if self.fails(&input.title) {
            return Err(TaskError::InvalidInput {
                message: format!("refusing {}", input.title),
            });
        }
        let mut initiatives = self.initiatives.borrow_mut();
        let number = next_number(
            initiatives
                .iter()
                .flat_map(|i| i.tasks.iter())
                .map(|t| t.identifier.as_str()),
            TaskId::PREFIX,
        );
        let parent = initiatives
            .iter_mut()
            .find(|initiative| initiative.identifier == input.initiative_identifier)
            .ok_or(TaskError::InitiativeNotFound)?;
        let mut created = task(
            &format!("T-{number}"),
            input.initiative_identifier.as_str(),
            &input.title,
        );
        created.description = input.description;
        created.kind = input.kind;
        created.status = input.status.unwrap_or_default();
        parent.tasks.push(created.clone());
        drop(initiatives);
        self.record(Call::CreateTask(
            input.initiative_identifier.to_string(),
            input.title,
        ));
        Ok(created)
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>, TaskError> {
        Ok(self.with_task(id, |task| task.clone()))
    }

    fn list_for_initiative(&self, initiative: &InitiativeId) -> Result<Vec<Task>, TaskError> {
        Ok(self
            .initiatives
            .borrow()
            .iter()
            .find(|i| &i.identifier == initiative)
            .map(|i| i.tasks.clone())
            .unwrap_or_default())
    }

    fn update(&self, id: &TaskId, input: UpdateTaskInput) -> Result<Task, TaskError> {
        validate_update_task(&input)?;
        let updated = self
            .with_task(id, |task| {
                if let Some(title) = &input.title {
                    task.title.clone_from(title);
                }
                if let Some(description) = &input.description {
                    task.description.clone_from(description);
                }
                if input.kind.is_some() {
                    task.kind.clone_from(&input.kind);
                }
                if let Some(status) = input.status {
                    task.status = status;
                }
                task.clone()
            })
            .ok_or(TaskError::NotFound)?;
        self.record(Call::UpdateTask(id.to_string(), input));
        Ok(updated)
    }

    fn delete(&self, id: &TaskId) -> Result<(), TaskError> {
        let mut initiatives = self.initiatives.borrow_mut();
        let parent = initiatives
            .iter_mut()
            .find(|initiative| initiative.task(id).is_some())
            .ok_or(TaskError::NotFound)?;
        parent.tasks.retain(|task| &task.identifier != id);
        drop(initiatives);
        self.record(Call::DeleteTask(id.to_string()));
        Ok(())
    }
}

impl ChecklistRepository for &RecordingStore {
    fn create(&self, input: CreateChecklistItemInput) -> Result<ChecklistItem, ChecklistError> {
        validate_create_checklist_item(&input)?;
        if self.fails(&input.title) {
            return Err(ChecklistError::InvalidInput {
                message: format!("refusing {}", input.title),
            });
        }
        let mut created = checklist_item(input.task_identifier.as_str(), &input.title);
        created.is_complete = input.is_complete;
        created.order = input.order.unwrap_or(0);
        let item = created.clone();
        self.with_task(&input.task_identifier, move |task| task.checklist.push(created))
            .ok_or(ChecklistError::TaskNotFound)?;
        self.record(Call::CreateChecklistItem(
            input.task_identifier.to_string(),
            input.title,
        ));
        Ok(item)
    }

    fn get(&self, id: &ChecklistItemId) -> Result<Option<ChecklistItem>, ChecklistError> {
        Ok(self
            .initiatives
            .borrow()
            .iter()
            .flat_map(|i| i.tasks.iter())
            .flat_map(|t| t.checklist.iter())
            .find(|item| &item.id == id)
            .cloned())
    }

    fn list_for_task(&self, task: &TaskId) -> Result<Vec<ChecklistItem>, ChecklistError> {
        Ok(self
            .with_task(task, |task| task.checklist.clone())
            .unwrap_or_default())
    }

    fn update(
        &self,
        id: &ChecklistItemId,
        input: UpdateChecklistItemInput,
    ) -> Result<ChecklistItem, ChecklistError> {
        validate_update_checklist_item(&input)?;
        let mut initiatives = self.initiatives.borrow_mut();
        let item = initiatives
            .iter_mut()
            .flat_map(|i| i.tasks.iter_mut())
            .flat_map(|t| t.checklist.iter_mut())
            .find(|item| &item.id == id)
            .ok_or(ChecklistError::NotFound)?;
        if let Some(title) = &input.title {
            item.title.clone_from(title);
        }
        if let Some(is_complete) = input.is_complete {
            item.is_complete = is_complete;
        }
        let updated = item.clone();
        drop(initiatives);
        self.record(Call::UpdateChecklistItem(id.to_string(), input));
        Ok(updated)
    }

    fn delete(&self, id: &ChecklistItemId) -> Result<(), ChecklistError> {
        let mut initiatives = self.initiatives.borrow_mut();
        let task = initiatives
            .iter_mut()
            .flat_map(|i| i.tasks.iter_mut())
            .find(|t| t.checklist_item(id).is_some())
            .ok_or(ChecklistError::NotFound)?;
        task.checklist.retain(|item| &item.id != id);
        drop(initiatives);
        self.record(Call::DeleteChecklistItem(id.to_string()));
        Ok(())
    }
}

impl Store for RecordingStore {
    type Initiatives<'a> = &'a RecordingStore;
    type Tasks<'a> = &'a RecordingStore;
    type Checklist<'a> = &'a RecordingStore;

    fn initiatives(&self) -> Self::Initiatives<'_> {
        self
    }

    fn tasks(&self) -> Self::Tasks<'_> {
        self
    }

    fn checklist(&self) -> Self::Checklist<'_> {
        self
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, BacklogError>
    where
        F: FnOnce(&Self) -> Result<T, BacklogError>,
    {
        f(self)
    }
}
