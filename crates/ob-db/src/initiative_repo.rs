use crate::task_repo::TaskRepo;
use crate::util::{decode_enum, encode_enum, from_rfc3339, next_number, to_rfc3339};
use ob_core::error::InitiativeError;
use ob_core::initiatives::InitiativeRepository;
use ob_core::tasks::TaskRepository;
use ob_core::types::{
    CreateInitiativeInput, Initiative, InitiativeFilter, InitiativeId, UpdateInitiativeInput,
    WorkspaceId,
};
use ob_core::validation::{validate_create_initiative, validate_update_initiative};
use rusqlite::Connection;

const COLUMNS: &str = "identifier, workspace_identifier, title, description, kind, status, sort_order, created_at, updated_at";

pub struct InitiativeRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> InitiativeRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn next_order(&self, workspace: &WorkspaceId) -> Result<i64, InitiativeError> {
        self.conn
            .query_row(
                "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM initiatives WHERE workspace_identifier = ?1",
                [workspace.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| InitiativeError::InvalidInput {
                message: err.to_string(),
            })
    }

    fn with_tasks(&self, mut initiative: Initiative) -> Result<Initiative, InitiativeError> {
        initiative.tasks = TaskRepo::new(self.conn)
            .list_for_initiative(&initiative.identifier)
            .map_err(|err| InitiativeError::InvalidInput {
                message: err.to_string(),
            })?;
        Ok(initiative)
    }
}

impl InitiativeRepository for InitiativeRepo<'_> {
    fn create(&self, input: CreateInitiativeInput) -> Result<Initiative, InitiativeError> {
        validate_create_initiative(&input)?;
        let now = chrono::Utc::now();
        let number = next_number(self.conn, InitiativeId::PREFIX).map_err(|err| {
            InitiativeError::InvalidInput {
                message: err.to_string(),
            }
        })?;
        let order = match input.order {
            Some(order) => order,
            None => self.next_order(&input.workspace_identifier)?,
        };

        let initiative = Initiative {
            identifier: InitiativeId::from_number(number),
            workspace_identifier: input.workspace_identifier,
            title: input.title.trim().to_string(),
            description: input.description,
            kind: input.kind,
            status: input.status.unwrap_or_default(),
            order,
            tasks: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let sql = format!(
            "INSERT INTO initiatives ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        );
        let params = (
            initiative.identifier.as_str(),
            initiative.workspace_identifier.as_str(),
            initiative.title.as_str(),
            initiative.description.as_str(),
            initiative.kind.as_deref(),
            encode_enum(&initiative.status).map_err(|err| InitiativeError::InvalidInput {
                message: err.to_string(),
            })?,
            initiative.order,
            to_rfc3339(&initiative.created_at),
            to_rfc3339(&initiative.updated_at),
        );
        self.conn
            .execute(&sql, params)
            .map_err(|err| InitiativeError::InvalidInput {
                message: err.to_string(),
            })?;

        tracing::debug!(identifier = %initiative.identifier, "initiative created");
        Ok(initiative)
    }

    fn get(&self, id: &InitiativeId) -> Result<Option<Initiative>, InitiativeError> {
        let sql = format!("SELECT {COLUMNS} FROM initiatives WHERE identifier = ?1");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| InitiativeError::InvalidInput {
                message: err.to_string(),
            })?;
        let mut rows = stmt
            .query([id.as_str()])
            .map_err(|err| InitiativeError::InvalidInput {
                message: err.to_string(),
            })?;
        let Some(row) = rows.next().map_err(|err| InitiativeError::InvalidInput {
            message: err.to_string(),
        })?
        else {
            return Ok(None);
        };
        let initiative = map_initiative_row(row)?;
        self.with_tasks(initiative).map(Some)
    }

    fn list(&self, filter: InitiativeFilter) -> Result<Vec<Initiative>, InitiativeError> {
        let sql = format!("SELECT {COLUMNS} FROM initiatives ORDER BY sort_order, rowid");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| InitiativeError::InvalidInput {
                message: err.to_string(),
            })?;
        let mut rows = stmt.query([]).map_err(|err| InitiativeError::InvalidInput {
            message: err.to_string(),
        })?;
        let mut initiatives = Vec::new();
        while let Some(row) = rows.next().map_err(|err| InitiativeError::InvalidInput {
            message: err.to_string(),
        })? {
            let initiative = map_initiative_row(row)?;
            if matches_filter(&initiative, &filter) {
                initiatives.push(initiative);
            }
        }
        initiatives
            .into_iter()
            .map(|initiative| self.with_tasks(initiative))
            .collect()
    }

    fn update(
        &self,
        id: &InitiativeId,
        input: UpdateInitiativeInput,
    ) -> Result<Initiative, InitiativeError> {
        validate_update_initiative(&input)?;
        let mut initiative = self.get(id)?.ok_or(InitiativeError::NotFound)?;
        if let Some(title) = input.title {
            initiative.title = title.trim().to_string();
        }
        if let Some(description) = input.description {
            initiative.description = description;
        }
        if let Some(kind) = input.kind {
            initiative.kind = Some(kind);
        }
        if let Some(status) = input.status {
            initiative.status = status;
        }
        initiative.updated_at = chrono::Utc::now();

        let affected = self
            .conn
            .execute(
                "UPDATE initiatives SET title = ?1, description = ?2, kind = ?3, status = ?4, updated_at = ?5 WHERE identifier = ?6",
                (
                    initiative.title.as_str(),
                    initiative.description.as_str(),
                    initiative.kind.as_deref(),
                    encode_enum(&initiative.status).map_err(|err| {
                        InitiativeError::InvalidInput {
                            message: err.to_string(),
                        }
                    })?,
                    to_rfc3339(&initiative.updated_at),
                    id.as_str(),
                ),
            )
            .map_err(|err| InitiativeError::InvalidInput {
                message: err.to_string(),
            })?;
        if affected == 0 {
            return Err(InitiativeError::NotFound);
        }
        Ok(initiative)
    }

    fn delete(&self, id: &InitiativeId) -> Result<(), InitiativeError> {
        let affected = self
            .conn
            .execute("DELETE FROM initiatives WHERE identifier = ?1", [id.as_str()])
            .map_err(|err| InitiativeError::InvalidInput {
                message: err.to_string(),
            })?;
        if affected == 0 {
            return Err(InitiativeError::NotFound);
        }
        Ok(())
    }
}

fn matches_filter(initiative: &Initiative, filter: &InitiativeFilter) -> bool {
    let workspace_ok = filter
        .workspace_identifier
        .as_ref()
        .is_none_or(|workspace| &initiative.workspace_identifier == workspace);
    let status_ok = filter
        .status
        .as_ref()
        .is_none_or(|statuses| statuses.contains(&initiative.status));
    workspace_ok && status_ok
}

fn map_initiative_row(row: &rusqlite::Row<'_>) -> Result<Initiative, InitiativeError> {
    let identifier: String = row.get(0).map_err(|err| InitiativeError::InvalidInput {
        message: err.to_string(),
    })?;
    let workspace_identifier: String = row.get(1).map_err(|err| InitiativeError::InvalidInput {
        message: err.to_string(),
    })?;
    let title: String = row.get(2).map_err(|err| InitiativeError::InvalidInput {
        message: err.to_string(),
    })?;
    let description: String = row.get(3).map_err(|err| InitiativeError::InvalidInput {
        message: err.to_string(),
    })?;
    let kind: Option<String> = row.get(4).map_err(|err| InitiativeError::InvalidInput {
        message: err.to_string(),
    })?;
    let status: String = row.get(5).map_err(|err| InitiativeError::InvalidInput {
        message: err.to_string(),
    })?;
    let order: i64 = row.get(6).map_err(|err| InitiativeError::InvalidInput {
        message: err.to_string(),
    })?;
    let created_at: String = row.get(7).map_err(|err| InitiativeError::InvalidInput {
        message: err.to_string(),
    })?;
    let updated_at: String = row.get(8).map_err(|err| InitiativeError::InvalidInput {
        message: err.to_string(),
    })?;

    Ok(Initiative {
        identifier: InitiativeId::new(identifier).map_err(|err| InitiativeError::InvalidInput {
            message: err.to_string(),
        })?,
        workspace_identifier: WorkspaceId::new(workspace_identifier).map_err(|err| {
            InitiativeError::InvalidInput {
                message: err.to_string(),
            }
        })?,
        title,
        description,
        kind,
        status: decode_enum(&status).map_err(|err| InitiativeError::InvalidInput {
            message: err.to_string(),
        })?,
        order,
        tasks: Vec::new(),
        created_at: from_rfc3339(&created_at).map_err(|err| InitiativeError::InvalidInput {
            message: err.to_string(),
        })?,
        updated_at: from_rfc3339(&updated_at).map_err(|err| InitiativeError::InvalidInput {
            message: err.to_string(),
        })?,
    })
}
