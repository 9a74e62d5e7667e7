//! Schema migrations.
//!
//! Each migration runs in its own transaction and records itself in
//! `schema_migrations`. A database written by a newer build is refused.

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::StoreError;

/// Highest schema version this build knows how to apply.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const MIGRATION_V1: &str = "
    CREATE TABLE schema_migrations (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL
    );

    CREATE TABLE pipelines (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL
    );

    CREATE TABLE stages (
        pipeline_id TEXT NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
        id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        ordinal INTEGER NOT NULL,
        visual TEXT,
        PRIMARY KEY (pipeline_id, id),
        UNIQUE (pipeline_id, ordinal)
    );
    -- Templates are keyed by stage id alone, so stage ids are catalog-wide.
    CREATE UNIQUE INDEX stages_unique_id ON stages(id);

    CREATE TABLE task_templates (
        id TEXT PRIMARY KEY,
        stage_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        priority TEXT NOT NULL,
        client_visible INTEGER NOT NULL,
        required INTEGER NOT NULL,
        due_in_days INTEGER,
        position INTEGER NOT NULL
    );
    CREATE INDEX task_templates_by_stage ON task_templates(stage_id, position);

    CREATE TABLE matters (
        id TEXT PRIMARY KEY,
        firm_id TEXT NOT NULL,
        lifecycle TEXT NOT NULL,
        current_stage TEXT,
        pipeline_id TEXT NOT NULL,
        assigned_associate TEXT,
        assigned_case_manager TEXT,
        internal_notes TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        version INTEGER NOT NULL
    );

    CREATE TABLE tasks (
        id TEXT PRIMARY KEY,
        matter_id TEXT NOT NULL REFERENCES matters(id),
        stage_id TEXT,
        template_id TEXT,
        origin TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL,
        priority TEXT NOT NULL,
        due_at INTEGER,
        client_visible INTEGER NOT NULL,
        required INTEGER NOT NULL,
        assignee TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX tasks_by_matter_stage ON tasks(matter_id, stage_id);
    CREATE UNIQUE INDEX tasks_one_per_template
        ON tasks(matter_id, stage_id, template_id)
        WHERE template_id IS NOT NULL;

    CREATE TABLE meetings (
        id TEXT PRIMARY KEY,
        matter_id TEXT NOT NULL REFERENCES matters(id),
        internal_party TEXT NOT NULL,
        external_party TEXT NOT NULL,
        kind TEXT NOT NULL,
        status TEXT NOT NULL,
        proposed_start INTEGER NOT NULL,
        confirmed_start INTEGER,
        confirmed_end INTEGER,
        video_link TEXT,
        location TEXT,
        internal_note TEXT,
        reschedule_count INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX meetings_by_matter ON meetings(matter_id);

    CREATE TABLE assignments (
        id TEXT PRIMARY KEY,
        matter_id TEXT NOT NULL REFERENCES matters(id),
        role TEXT NOT NULL,
        user_id TEXT NOT NULL,
        assigned_by TEXT NOT NULL,
        assigned_at INTEGER NOT NULL,
        superseded_at INTEGER
    );
    CREATE UNIQUE INDEX assignments_one_current
        ON assignments(matter_id, role)
        WHERE superseded_at IS NULL;

    CREATE TABLE history_events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        matter_id TEXT NOT NULL REFERENCES matters(id),
        actor TEXT NOT NULL,
        action TEXT NOT NULL,
        occurred_at INTEGER NOT NULL,
        payload TEXT NOT NULL
    );
    CREATE INDEX history_by_matter ON history_events(matter_id, occurred_at, seq);
";

/// Brings `conn` up to [`CURRENT_SCHEMA_VERSION`].
pub(crate) fn bootstrap(conn: &mut Connection) -> Result<(), StoreError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let current = current_schema_version(conn)?;
    if current > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            supported: CURRENT_SCHEMA_VERSION,
            found: current,
        });
    }

    for version in (current + 1)..=CURRENT_SCHEMA_VERSION {
        let tx = conn.transaction()?;
        apply_migration(&tx, version)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) \
             VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            params![version],
        )?;
        tx.commit()?;
        tracing::info!(version, "applied schema migration");
    }
    Ok(())
}

/// The highest applied migration, `0` for a fresh database.
pub(crate) fn current_schema_version(conn: &Connection) -> Result<u32, StoreError> {
    let has_table = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_table {
        return Ok(0);
    }
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn apply_migration(tx: &Transaction<'_>, version: u32) -> Result<(), StoreError> {
    match version {
        1 => tx.execute_batch(MIGRATION_V1)?,
        other => {
            return Err(StoreError::UnsupportedSchemaVersion {
                supported: CURRENT_SCHEMA_VERSION,
                found: other,
            })
        }
    }
    Ok(())
}
