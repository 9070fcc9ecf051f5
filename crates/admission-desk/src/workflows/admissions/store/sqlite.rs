use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use super::{ApplicationStore, StoreError};
use crate::workflows::admissions::domain::{
    Application, ApplicationId, ApplicationStatus, ParticipantId, ValidatedApplication,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS applications (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    applicant_id     TEXT NOT NULL,
    applicant_handle TEXT,
    full_name        TEXT NOT NULL,
    birth_date       TEXT NOT NULL,
    email            TEXT NOT NULL,
    document_type    TEXT NOT NULL DEFAULT '',
    program_level    TEXT NOT NULL,
    direction        TEXT NOT NULL,
    exam_form        TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'new'
                     CHECK (status IN ('new', 'approved', 'rejected')),
    created_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS applications_by_applicant
    ON applications (applicant_id, id DESC);
";

const SELECT_COLUMNS: &str = "SELECT id, applicant_id, applicant_handle, full_name, birth_date, \
     email, document_type, program_level, direction, exam_form, status, created_at \
     FROM applications";

impl ToSql for ApplicationStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ApplicationStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|e: String| {
            FromSqlError::Other(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            )))
        })
    }
}

/// SQLite-backed store. A single connection is shared behind a mutex and every
/// status change runs inside an immediate transaction.
#[derive(Debug, Clone)]
pub struct SqliteApplicationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteApplicationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            StoreError::Unavailable(format!(
                "failed to open application database {}: {e}",
                path.display()
            ))
        })?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(|e| {
            StoreError::Unavailable(format!("failed to create applications table: {e}"))
        })?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("application store lock poisoned: {e}")))
    }
}

impl ApplicationStore for SqliteApplicationStore {
    fn create(&self, application: ValidatedApplication) -> Result<Application, StoreError> {
        let created_at = Utc::now();
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO applications (
                     applicant_id, applicant_handle, full_name, birth_date, email,
                     document_type, program_level, direction, exam_form, status, created_at
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    application.applicant_id.as_str(),
                    application.applicant_handle,
                    application.full_name,
                    application.birth_date,
                    application.email,
                    application.document_type,
                    application.program_level,
                    application.direction,
                    application.exam_form,
                    ApplicationStatus::New,
                    created_at,
                ],
            )
            .map_err(unavailable)?;
        let id = ApplicationId(guard.last_insert_rowid());
        debug!(%id, "application row inserted");

        Ok(Application::from_validated(id, application, created_at))
    }

    fn get(&self, id: ApplicationId) -> Result<Application, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.0],
                read_application,
            )
            .optional()
            .map_err(unavailable)?
            .ok_or(StoreError::NotFound(id))
    }

    fn list_by_applicant(
        &self,
        applicant: &ParticipantId,
    ) -> Result<Vec<Application>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(&format!(
                "{SELECT_COLUMNS} WHERE applicant_id = ?1 ORDER BY id DESC"
            ))
            .map_err(unavailable)?;
        let rows = statement
            .query_map(params![applicant.as_str()], read_application)
            .map_err(unavailable)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(unavailable)
    }

    fn set_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(unavailable)?;

        let current: ApplicationStatus = tx
            .query_row(
                "SELECT status FROM applications WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(unavailable)?
            .ok_or(StoreError::NotFound(id))?;

        if !current.can_transition_to(status) {
            return Err(StoreError::IllegalTransition {
                id,
                current,
                requested: status,
            });
        }

        let updated = tx
            .execute(
                "UPDATE applications SET status = ?2 WHERE id = ?1 AND status = ?3",
                params![id.0, status, current],
            )
            .map_err(unavailable)?;
        if updated != 1 {
            return Err(StoreError::IllegalTransition {
                id,
                current,
                requested: status,
            });
        }

        let record = tx
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.0],
                read_application,
            )
            .map_err(unavailable)?;
        tx.commit().map_err(unavailable)?;

        Ok(record)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let guard = self.lock()?;
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM applications", [], |row| row.get(0))
            .map_err(unavailable)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn read_application(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: ApplicationId(row.get(0)?),
        applicant_id: ParticipantId(row.get(1)?),
        applicant_handle: row.get(2)?,
        full_name: row.get(3)?,
        birth_date: row.get(4)?,
        email: row.get(5)?,
        document_type: row.get(6)?,
        program_level: row.get(7)?,
        direction: row.get(8)?,
        exam_form: row.get(9)?,
        status: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn unavailable(err: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}
