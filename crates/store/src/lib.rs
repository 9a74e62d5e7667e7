//! SQLite persistence for the Matterflow coordination engine.
//!
//! [`SqliteStore`] implements both [`CoordinationStore`] and [`PipelineCatalog`]
//! over a single `rusqlite` connection.
//!
//! ## Architectural Layer
//!
//! **Infrastructure adapter.** No coordination rules live here. The store
//! enforces only what a relational schema can: the optimistic matter
//! version, one materialized task per (matter, stage, template), one current
//! assignment per (matter, role), and atomic history append.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`schema`] | Migrations and the schema version check |
//! | `codec` | Row mappers and column conversions |
//! | `commit` | The transactional write path |
//! | `catalog` | Pipeline and template tables |
//! | [`error`] | [`StoreError`] and its domain mapping |

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use coordination::{
    Assignment, AssignmentRole, CommitReceipt, CoordinationError, CoordinationStore,
    HistoryEvent, Matter, MatterCommit, MatterId, Meeting, MeetingId, Pipeline, PipelineCatalog,
    PipelineId, StageId, Task, TaskId, TaskTemplate,
};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

mod catalog;
mod codec;
mod commit;
pub mod error;
pub mod schema;

#[cfg(test)]
mod tests;

pub use error::StoreError;
pub use schema::CURRENT_SCHEMA_VERSION;

use codec::{
    assignment_from_row, history_from_row, matter_from_row, meeting_from_row, task_from_row,
    text, ASSIGNMENT_COLUMNS, HISTORY_COLUMNS, MATTER_COLUMNS, MEETING_COLUMNS, TASK_COLUMNS,
};

/// A coordination store backed by one SQLite database.
///
/// The connection is serialised behind an async mutex; every commit runs in
/// an IMMEDIATE transaction so concurrent writers are ordered by SQLite as well.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies pending migrations.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let mut conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;
        schema::bootstrap(&mut conn)?;
        tracing::info!(path = %path.as_ref().display(), "opened coordination store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A private in-memory database, used by tests and dry runs.
    pub fn in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        schema::bootstrap(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// The applied schema version.
    pub async fn schema_version(&self) -> Result<u32, StoreError> {
        let conn = self.conn.lock().await;
        schema::current_schema_version(&conn)
    }

    /// Replaces the pipeline and template catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Configuration`] when a template references
    /// a stage missing from `pipelines` or two templates share an id.
    pub async fn seed_catalog(
        &self,
        pipelines: &[Pipeline],
        templates: &[TaskTemplate],
    ) -> Result<(), CoordinationError> {
        let mut conn = self.conn.lock().await;
        catalog::seed(&mut conn, pipelines, templates)
    }

    /// Records a newly intaken matter. Intake is not a history event.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Validation`] when the id is already taken.
    pub async fn insert_matter(&self, matter: &Matter) -> Result<(), CoordinationError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO matters (id, firm_id, lifecycle, current_stage, pipeline_id, \
             assigned_associate, assigned_case_manager, internal_notes, created_at, \
             updated_at, version) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                matter.id.to_string(),
                matter.firm_id.as_str(),
                matter.lifecycle.as_str(),
                text(matter.current_stage.as_ref()),
                matter.pipeline_id.as_str(),
                text(matter.assigned_associate.as_ref()),
                text(matter.assigned_case_manager.as_ref()),
                matter.internal_notes,
                matter.created_at.as_micros(),
                matter.updated_at.as_micros(),
                matter.version,
            ],
        )
        .map_err(|err| {
            let err = StoreError::from(err);
            if err.is_primary_key_violation() {
                StoreError::DuplicateMatter(matter.id)
            } else {
                err
            }
        })?;
        tracing::info!(matter_id = %matter.id, pipeline_id = %matter.pipeline_id, "matter recorded");
        Ok(())
    }
}

fn query_all<T>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, CoordinationError> {
    let mut stmt = conn.prepare(sql).map_err(StoreError::from)?;
    let rows = stmt.query_map(params, map).map_err(StoreError::from)?;
    let collected = rows
        .collect::<rusqlite::Result<Vec<T>>>()
        .map_err(StoreError::from)?;
    Ok(collected)
}

fn query_one<T>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> Result<Option<T>, CoordinationError> {
    let found = conn
        .query_row(sql, params, map)
        .optional()
        .map_err(StoreError::from)?;
    Ok(found)
}

#[async_trait]
impl CoordinationStore for SqliteStore {
    async fn load_matter(&self, id: MatterId) -> Result<Option<Matter>, CoordinationError> {
        let conn = self.conn.lock().await;
        query_one(
            &conn,
            &format!("SELECT {MATTER_COLUMNS} FROM matters WHERE id = ?1"),
            params![id.to_string()],
            matter_from_row,
        )
    }

    async fn load_tasks(
        &self,
        matter: MatterId,
        stage: Option<&StageId>,
    ) -> Result<Vec<Task>, CoordinationError> {
        let conn = self.conn.lock().await;
        match stage {
            Some(stage) => query_all(
                &conn,
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE matter_id = ?1 AND stage_id = ?2 \
                     ORDER BY created_at, rowid"
                ),
                params![matter.to_string(), stage.as_str()],
                task_from_row,
            ),
            None => query_all(
                &conn,
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE matter_id = ?1 \
                     ORDER BY created_at, rowid"
                ),
                params![matter.to_string()],
                task_from_row,
            ),
        }
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>, CoordinationError> {
        let conn = self.conn.lock().await;
        query_one(
            &conn,
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id.to_string()],
            task_from_row,
        )
    }

    async fn load_meeting(&self, id: MeetingId) -> Result<Option<Meeting>, CoordinationError> {
        let conn = self.conn.lock().await;
        query_one(
            &conn,
            &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = ?1"),
            params![id.to_string()],
            meeting_from_row,
        )
    }

    async fn load_meetings(&self, matter: MatterId) -> Result<Vec<Meeting>, CoordinationError> {
        let conn = self.conn.lock().await;
        query_all(
            &conn,
            &format!(
                "SELECT {MEETING_COLUMNS} FROM meetings WHERE matter_id = ?1 \
                 ORDER BY created_at, rowid"
            ),
            params![matter.to_string()],
            meeting_from_row,
        )
    }

    async fn current_assignment(
        &self,
        matter: MatterId,
        role: AssignmentRole,
    ) -> Result<Option<Assignment>, CoordinationError> {
        let conn = self.conn.lock().await;
        query_one(
            &conn,
            &format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM assignments \
                 WHERE matter_id = ?1 AND role = ?2 AND superseded_at IS NULL"
            ),
            params![matter.to_string(), role.as_str()],
            assignment_from_row,
        )
    }

    async fn assignment_history(
        &self,
        matter: MatterId,
        role: AssignmentRole,
    ) -> Result<Vec<Assignment>, CoordinationError> {
        let conn = self.conn.lock().await;
        query_all(
            &conn,
            &format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE matter_id = ?1 AND role = ?2 \
                 ORDER BY assigned_at, rowid"
            ),
            params![matter.to_string(), role.as_str()],
            assignment_from_row,
        )
    }

    async fn timeline(&self, matter: MatterId) -> Result<Vec<HistoryEvent>, CoordinationError> {
        let conn = self.conn.lock().await;
        query_all(
            &conn,
            &format!(
                "SELECT {HISTORY_COLUMNS} FROM history_events WHERE matter_id = ?1 \
                 ORDER BY occurred_at DESC, seq DESC"
            ),
            params![matter.to_string()],
            history_from_row,
        )
    }

    async fn commit(&self, commit: MatterCommit) -> Result<CommitReceipt, CoordinationError> {
        let mut conn = self.conn.lock().await;
        commit::apply(&mut conn, commit)
    }
}

#[async_trait]
impl PipelineCatalog for SqliteStore {
    async fn pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>, CoordinationError> {
        let conn = self.conn.lock().await;
        catalog::load_pipeline(&conn, id)
    }

    async fn templates_for_stage(
        &self,
        stage: &StageId,
    ) -> Result<Vec<TaskTemplate>, CoordinationError> {
        let conn = self.conn.lock().await;
        catalog::load_templates(&conn, stage)
    }
}
