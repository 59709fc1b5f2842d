use crate::util::{from_rfc3339, to_rfc3339};
use ob_core::checklist::ChecklistRepository;
use ob_core::error::ChecklistError;
use ob_core::types::{
    ChecklistItem, ChecklistItemId, CreateChecklistItemInput, TaskId, UpdateChecklistItemInput,
};
use ob_core::validation::{validate_create_checklist_item, validate_update_checklist_item};
use rusqlite::{Connection, OptionalExtension};

const COLUMNS: &str = "id, task_identifier, title, is_complete, sort_order, created_at, updated_at";

pub struct ChecklistRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ChecklistRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn task_exists(&self, id: &TaskId) -> Result<bool, ChecklistError> {
        self.conn
            .query_row("SELECT 1 FROM tasks WHERE identifier = ?1", [id.as_str()], |_| {
                Ok(())
            })
            .optional()
            .map(|found| found.is_some())
            .map_err(|err| ChecklistError::InvalidInput {
                message: err.to_string(),
            })
    }

    fn next_order(&self, task: &TaskId) -> Result<i64, ChecklistError> {
        self.conn
            .query_row(
                "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM checklist_items WHERE task_identifier = ?1",
                [task.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| ChecklistError::InvalidInput {
                message: err.to_string(),
            })
    }
}

impl ChecklistRepository for ChecklistRepo<'_> {
    fn create(&self, input: CreateChecklistItemInput) -> Result<ChecklistItem, ChecklistError> {
        validate_create_checklist_item(&input)?;
        if !self.task_exists(&input.task_identifier)? {
            return Err(ChecklistError::TaskNotFound);
        }
        let now = chrono::Utc::now();
        let order = match input.order {
            Some(order) => order,
            None => self.next_order(&input.task_identifier)?,
        };

        let item = ChecklistItem {
            id: ChecklistItemId::generate(),
            task_identifier: input.task_identifier,
            title: input.title.trim().to_string(),
            is_complete: input.is_complete,
            order,
            created_at: now,
            updated_at: now,
        };

        let sql = format!("INSERT INTO checklist_items ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)");
        self.conn
            .execute(
                &sql,
                (
                    item.id.as_str(),
                    item.task_identifier.as_str(),
                    item.title.as_str(),
                    item.is_complete,
                    item.order,
                    to_rfc3339(&item.created_at),
                    to_rfc3339(&item.updated_at),
                ),
            )
            .map_err(|err| ChecklistError::InvalidInput {
                message: err.to_string(),
            })?;
        Ok(item)
    }

    fn get(&self, id: &ChecklistItemId) -> Result<Option<ChecklistItem>, ChecklistError> {
        let sql = format!("SELECT {COLUMNS} FROM checklist_items WHERE id = ?1");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| ChecklistError::InvalidInput {
                message: err.to_string(),
            })?;
        let mut rows = stmt
            .query([id.as_str()])
            .map_err(|err| ChecklistError::InvalidInput {
                message: err.to_string(),
            })?;
        let Some(row) = rows.next().map_err(|err| ChecklistError::InvalidInput {
            message: err.to_string(),
        })?
        else {
            return Ok(None);
        };
        map_item_row(row).map(Some)
    }

    fn list_for_task(&self, task: &TaskId) -> Result<Vec<ChecklistItem>, ChecklistError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM checklist_items WHERE task_identifier = ?1 ORDER BY sort_order, rowid"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| ChecklistError::InvalidInput {
                message: err.to_string(),
            })?;
        let mut rows = stmt
            .query([task.as_str()])
            .map_err(|err| ChecklistError::InvalidInput {
                message: err.to_string(),
            })?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().map_err(|err| ChecklistError::InvalidInput {
            message: err.to_string(),
        })? {
            items.push(map_item_row(row)?);
        }
        Ok(items)
    }

    fn update(
        &self,
        id: &ChecklistItemId,
        input: UpdateChecklistItemInput,
    ) -> Result<ChecklistItem, ChecklistError> {
        validate_update_checklist_item(&input)?;
        let mut item = self.get(id)?.ok_or(ChecklistError::NotFound)?;
        if let Some(title) = input.title {
            item.title = title.trim().to_string();
        }
        if let Some(is_complete) = input.is_complete {
            item.is_complete = is_complete;
        }
        item.updated_at = chrono::Utc::now();

        let affected = self
            .conn
            .execute(
                "UPDATE checklist_items SET title = ?1, is_complete = ?2, updated_at = ?3 WHERE id = ?4",
                (
                    item.title.as_str(),
                    item.is_complete,
                    to_rfc3339(&item.updated_at),
                    id.as_str(),
                ),
            )
            .map_err(|err| ChecklistError::InvalidInput {
                message: err.to_string(),
            })?;
        if affected == 0 {
            return Err(ChecklistError::NotFound);
        }
        Ok(item)
    }

    fn delete(&self, id: &ChecklistItemId) -> Result<(), ChecklistError> {
        let affected = self
            .conn
            .execute("DELETE FROM checklist_items WHERE id = ?1", [id.as_str()])
            .map_err(|err| ChecklistError::InvalidInput {
                message: err.to_string(),
            })?;
        if affected == 0 {
            return Err(ChecklistError::NotFound);
        }
        Ok(())
    }
}

fn map_item_row(row: &rusqlite::Row<'_>) -> Result<ChecklistItem, ChecklistError> {
    let id: String = row.get(0).map_err(|err| ChecklistError::InvalidInput {
        message: err.to_string(),
    })?;
    let task_identifier: String = row.get(1).map_err(|err| ChecklistError::InvalidInput {
        message: err.to_string(),
    })?;
    let title: String = row.get(2).map_err(|err| ChecklistError::InvalidInput {
        message: err.to_string(),
    })?;
    let is_complete: bool = row.get(3).map_err(|err| ChecklistError::InvalidInput {
        message: err.to_string(),
    })?;
    let order: i64 = row.get(4).map_err(|err| ChecklistError::InvalidInput {
        message: err.to_string(),
    })?;
    let created_at: String = row.get(5).map_err(|err| ChecklistError::InvalidInput {
        message: err.to_string(),
    })?;
    let updated_at: String = row.get(6).map_err(|err| ChecklistError::InvalidInput {
        message: err.to_string(),
    })?;

    Ok(ChecklistItem {
        id: ChecklistItemId::new(id).map_err(|err| ChecklistError::InvalidInput {
            message: err.to_string(),
        })?,
        task_identifier: TaskId::new(task_identifier).map_err(|err| {
            ChecklistError::InvalidInput {
                message: err.to_string(),
            }
        })?,
        title,
        is_complete,
        order,
        created_at: from_rfc3339(&created_at).map_err(|err| ChecklistError::InvalidInput {
            message: err.to_string(),
        })?,
        updated_at: from_rfc3339(&updated_at).map_err(|err| ChecklistError::InvalidInput {
            message: err.to_string(),
        })?,
    })
}
