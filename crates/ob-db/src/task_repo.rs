use crate::checklist_repo::ChecklistRepo;
use crate::util::{decode_enum, encode_enum, from_rfc3339, next_number, to_rfc3339};
use ob_core::checklist::ChecklistRepository;
use ob_core::error::TaskError;
use ob_core::tasks::TaskRepository;
use ob_core::types::{CreateTaskInput, InitiativeId, Task, TaskId, UpdateTaskInput};
use ob_core::validation::{validate_create_task, validate_update_task};
use rusqlite::{Connection, OptionalExtension};

const COLUMNS: &str =
    "identifier, initiative_identifier, title, description, kind, status, created_at, updated_at";

pub struct TaskRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> TaskRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn initiative_exists(&self, id: &InitiativeId) -> Result<bool, TaskError> {
        self.conn
            .query_row(
                "SELECT 1 FROM initiatives WHERE identifier = ?1",
                [id.as_str()],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(|err| TaskError::InvalidInput {
                message: err.to_string(),
            })
    }

    fn with_checklist(&self, mut task: Task) -> Result<Task, TaskError> {
        task.checklist = ChecklistRepo::new(self.conn)
            .list_for_task(&task.identifier)
            .map_err(|err| TaskError::InvalidInput {
                message: err.to_string(),
            })?;
        Ok(task)
    }
}

impl TaskRepository for TaskRepo<'_> {
    fn create(&self, input: CreateTaskInput) -> Result<Task, TaskError> {
        validate_create_task(&input)?;
        if !self.initiative_exists(&input.initiative_identifier)? {
            return Err(TaskError::InitiativeNotFound);
        }
        let now = chrono::Utc::now();
        let number = next_number(self.conn, TaskId::PREFIX).map_err(|err| {
            TaskError::InvalidInput {
                message: err.to_string(),
            }
        })?;

        let task = Task {
            identifier: TaskId::from_number(number),
            initiative_identifier: input.initiative_identifier,
            title: input.title.trim().to_string(),
            description: input.description,
            kind: input.kind,
            status: input.status.unwrap_or_default(),
            checklist: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let sql = format!("INSERT INTO tasks ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)");
        let params = (
            task.identifier.as_str(),
            task.initiative_identifier.as_str(),
            task.title.as_str(),
            task.description.as_str(),
            task.kind.as_deref(),
            encode_enum(&task.status).map_err(|err| TaskError::InvalidInput {
                message: err.to_string(),
            })?,
            to_rfc3339(&task.created_at),
            to_rfc3339(&task.updated_at),
        );
        self.conn
            .execute(&sql, params)
            .map_err(|err| TaskError::InvalidInput {
                message: err.to_string(),
            })?;

        tracing::debug!(identifier = %task.identifier, initiative = %task.initiative_identifier, "task created");
        Ok(task)
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>, TaskError> {
        let sql = format!("SELECT {COLUMNS} FROM tasks WHERE identifier = ?1");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| TaskError::InvalidInput {
                message: err.to_string(),
            })?;
        let mut rows = stmt
            .query([id.as_str()])
            .map_err(|err| TaskError::InvalidInput {
                message: err.to_string(),
            })?;
        let Some(row) = rows.next().map_err(|err| TaskError::InvalidInput {
            message: err.to_string(),
        })?
        else {
            return Ok(None);
        };
        let task = map_task_row(row)?;
        self.with_checklist(task).map(Some)
    }

    fn list_for_initiative(&self, initiative: &InitiativeId) -> Result<Vec<Task>, TaskError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM tasks WHERE initiative_identifier = ?1 ORDER BY rowid"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| TaskError::InvalidInput {
                message: err.to_string(),
            })?;
        let mut rows = stmt
            .query([initiative.as_str()])
            .map_err(|err| TaskError::InvalidInput {
                message: err.to_string(),
            })?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().map_err(|err| TaskError::InvalidInput {
            message: err.to_string(),
        })? {
            tasks.push(map_task_row(row)?);
        }
        tasks
            .into_iter()
            .map(|task| self.with_checklist(task))
            .collect()
    }

    fn update(&self, id: &TaskId, input: UpdateTaskInput) -> Result<Task, TaskError> {
        validate_update_task(&input)?;
        let mut task = self.get(id)?.ok_or(TaskError::NotFound)?;
        if let Some(title) = input.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = input.description {
            task.description = description;
        }
        if let Some(kind) = input.kind {
            task.kind = Some(kind);
        }
        if let Some(status) = input.status {
            task.status = status;
        }
        task.updated_at = chrono::Utc::now();

        let affected = self
            .conn
            .execute(
                "UPDATE tasks SET title = ?1, description = ?2, kind = ?3, status = ?4, updated_at = ?5 WHERE identifier = ?6",
                (
                    task.title.as_str(),
                    task.description.as_str(),
                    task.kind.as_deref(),
                    encode_enum(&task.status).map_err(|err| TaskError::InvalidInput {
                        message: err.to_string(),
                    })?,
                    to_rfc3339(&task.updated_at),
                    id.as_str(),
                ),
            )
            .map_err(|err| TaskError::InvalidInput {
                message: err.to_string(),
            })?;
        if affected == 0 {
            return Err(TaskError::NotFound);
        }
        Ok(task)
    }

    fn delete(&self, id: &TaskId) -> Result<(), TaskError> {
        let affected = self
            .conn
            .execute("DELETE FROM tasks WHERE identifier = ?1", [id.as_str()])
            .map_err(|err| TaskError::InvalidInput {
                message: err.to_string(),
            })?;
        if affected == 0 {
            return Err(TaskError::NotFound);
        }
        Ok(())
    }
}

fn map_task_row(row: &rusqlite::Row<'_>) -> Result<Task, TaskError> {
    let identifier: String = row.get(0).map_err(|err| TaskError::InvalidInput {
        message: err.to_string(),
    })?;
    let initiative_identifier: String = row.get(1).map_err(|err| TaskError::InvalidInput {
        message: err.to_string(),
    })?;
    let title: String = row.get(2).map_err(|err| TaskError::InvalidInput {
        message: err.to_string(),
    })?;
    let description: String = row.get(3).map_err(|err| TaskError::InvalidInput {
        message: err.to_string(),
    })?;
    let kind: Option<String> = row.get(4).map_err(|err| TaskError::InvalidInput {
        message: err.to_string(),
    })?;
    let status: String = row.get(5).map_err(|err| TaskError::InvalidInput {
        message: err.to_string(),
    })?;
    let created_at: String = row.get(6).map_err(|err| TaskError::InvalidInput {
        message: err.to_string(),
    })?;
    let updated_at: String = row.get(7).map_err(|err| TaskError::InvalidInput {
        message: err.to_string(),
    })?;

    Ok(Task {
        identifier: TaskId::new(identifier).map_err(|err| TaskError::InvalidInput {
            message: err.to_string(),
        })?,
        initiative_identifier: InitiativeId::new(initiative_identifier).map_err(|err| {
            TaskError::InvalidInput {
                message: err.to_string(),
            }
        })?,
        title,
        description,
        kind,
        status: decode_enum(&status).map_err(|err| TaskError::InvalidInput {
            message: err.to_string(),
        })?,
        checklist: Vec::new(),
        created_at: from_rfc3339(&created_at).map_err(|err| TaskError::InvalidInput {
            message: err.to_string(),
        })?,
        updated_at: from_rfc3339(&updated_at).map_err(|err| TaskError::InvalidInput {
            message: err.to_string(),
        })?,
    })
}
