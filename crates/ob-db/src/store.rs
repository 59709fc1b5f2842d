use ob_core::BacklogError;
use ob_core::store::Store;
use rusqlite::Connection;

use crate::checklist_repo::ChecklistRepo;
use crate::initiative_repo::InitiativeRepo;
use crate::task_repo::TaskRepo;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for DbStore {
    type Initiatives<'a>
        = InitiativeRepo<'a>
    where
        Self: 'a;
    type Tasks<'a>
        = TaskRepo<'a>
    where
        Self: 'a;
    type Checklist<'a>
        = ChecklistRepo<'a>
    where
        Self: 'a;

    fn initiatives(&self) -> Self::Initiatives<'_> {
        InitiativeRepo::new(&self.conn)
    }

    fn tasks(&self) -> Self::Tasks<'_> {
        TaskRepo::new(&self.conn)
    }

    fn checklist(&self) -> Self::Checklist<'_> {
        ChecklistRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, BacklogError>
    where
        F: FnOnce(&Self) -> Result<T, BacklogError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|err| BacklogError::Internal {
                message: err.to_string(),
            })?;
        let result = f(self);
        match result {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|err| BacklogError::Internal {
                        message: err.to_string(),
                    })?;
                Ok(value)
            }
            Err(err) => {
                self.conn
                    .execute_batch("ROLLBACK")
                    .map_err(|rollback_err| BacklogError::Internal {
                        message: rollback_err.to_string(),
                    })?;
                Err(err)
            }
        }
    }
}
