//! Row mappers and column conversions.
//!
//! Identifiers and tags are stored as text, timestamps as UTC microseconds,
//! booleans as integers and history payloads as JSON. Anything that fails to
//! decode surfaces as a `FromSqlConversionFailure` naming the column.

use coordination::{
    Assignment, AssignmentId, AssignmentRole, FirmId, HistoryEvent, HistoryEventId,
    HistoryPayload, LifecycleState, Matter, MatterId, Meeting, MeetingId, MeetingKind,
    MeetingStatus, PartyId, PipelineId, StageId, Task, TaskId, TaskOrigin, TaskPriority,
    TaskStatus, Timestamp, UserId,
};
use rusqlite::Row;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("column {column}: cannot decode {raw:?}")]
struct DecodeError {
    column: &'static str,
    raw: String,
}

fn to_from_sql_error<E>(err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
}

fn decode<T>(
    column: &'static str,
    raw: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        to_from_sql_error(DecodeError {
            column,
            raw: raw.to_string(),
        })
    })
}

fn decode_opt<T>(
    column: &'static str,
    raw: Option<String>,
    parse: impl FnOnce(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    raw.map(|value| decode(column, &value, parse)).transpose()
}

fn timestamp(column: &'static str, micros: i64) -> rusqlite::Result<Timestamp> {
    Timestamp::from_micros(micros).ok_or_else(|| {
        to_from_sql_error(DecodeError {
            column,
            raw: micros.to_string(),
        })
    })
}

fn timestamp_opt(column: &'static str, micros: Option<i64>) -> rusqlite::Result<Option<Timestamp>> {
    micros.map(|value| timestamp(column, value)).transpose()
}

pub(crate) fn micros(at: Option<Timestamp>) -> Option<i64> {
    at.map(Timestamp::as_micros)
}

pub(crate) fn text<T: ToString>(value: Option<&T>) -> Option<String> {
    value.map(ToString::to_string)
}

// ---------------------------------------------------------------------------
// Matters
// ---------------------------------------------------------------------------

pub(crate) const MATTER_COLUMNS: &str = "id, firm_id, lifecycle, current_stage, pipeline_id, \
    assigned_associate, assigned_case_manager, internal_notes, created_at, updated_at, version";

pub(crate) fn matter_from_row(row: &Row<'_>) -> rusqlite::Result<Matter> {
    Ok(Matter {
        id: decode("matters.id", &row.get::<_, String>(0)?, MatterId::parse)?,
        firm_id: decode("matters.firm_id", &row.get::<_, String>(1)?, |s| FirmId::new(s))?,
        lifecycle: decode(
            "matters.lifecycle",
            &row.get::<_, String>(2)?,
            LifecycleState::parse,
        )?,
        current_stage: decode_opt("matters.current_stage", row.get(3)?, |s| StageId::new(s))?,
        pipeline_id: decode("matters.pipeline_id", &row.get::<_, String>(4)?, |s| {
            PipelineId::new(s)
        })?,
        assigned_associate: decode_opt("matters.assigned_associate", row.get(5)?, |s| {
            UserId::new(s)
        })?,
        assigned_case_manager: decode_opt("matters.assigned_case_manager", row.get(6)?, |s| {
            UserId::new(s)
        })?,
        internal_notes: row.get(7)?,
        created_at: timestamp("matters.created_at", row.get(8)?)?,
        updated_at: timestamp("matters.updated_at", row.get(9)?)?,
        version: row.get(10)?,
    })
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub(crate) const TASK_COLUMNS: &str = "id, matter_id, stage_id, title, description, status, \
    priority, due_at, client_visible, required, assignee, origin, created_at, updated_at";

pub(crate) fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: decode("tasks.id", &row.get::<_, String>(0)?, TaskId::parse)?,
        matter_id: decode("tasks.matter_id", &row.get::<_, String>(1)?, MatterId::parse)?,
        stage_id: decode_opt("tasks.stage_id", row.get(2)?, |s| StageId::new(s))?,
        title: row.get(3)?,
        description: row.get(4)?,
        status: decode("tasks.status", &row.get::<_, String>(5)?, TaskStatus::parse)?,
        priority: decode("tasks.priority", &row.get::<_, String>(6)?, TaskPriority::parse)?,
        due_at: timestamp_opt("tasks.due_at", row.get(7)?)?,
        client_visible: row.get(8)?,
        required: row.get(9)?,
        assignee: decode_opt("tasks.assignee", row.get(10)?, |s| UserId::new(s))?,
        origin: decode("tasks.origin", &row.get::<_, String>(11)?, TaskOrigin::parse)?,
        created_at: timestamp("tasks.created_at", row.get(12)?)?,
        updated_at: timestamp("tasks.updated_at", row.get(13)?)?,
    })
}

// ---------------------------------------------------------------------------
// Meetings
// ---------------------------------------------------------------------------

pub(crate) const MEETING_COLUMNS: &str = "id, matter_id, internal_party, external_party, kind, \
    status, proposed_start, confirmed_start, confirmed_end, video_link, location, internal_note, \
    reschedule_count, created_at, updated_at";

pub(crate) fn meeting_from_row(row: &Row<'_>) -> rusqlite::Result<Meeting> {
    Ok(Meeting {
        id: decode("meetings.id", &row.get::<_, String>(0)?, MeetingId::parse)?,
        matter_id: decode("meetings.matter_id", &row.get::<_, String>(1)?, MatterId::parse)?,
        internal_party: decode("meetings.internal_party", &row.get::<_, String>(2)?, |s| {
            UserId::new(s)
        })?,
        external_party: decode("meetings.external_party", &row.get::<_, String>(3)?, |s| {
            PartyId::new(s)
        })?,
        kind: decode("meetings.kind", &row.get::<_, String>(4)?, MeetingKind::parse)?,
        status: decode("meetings.status", &row.get::<_, String>(5)?, MeetingStatus::parse)?,
        proposed_start: timestamp("meetings.proposed_start", row.get(6)?)?,
        confirmed_start: timestamp_opt("meetings.confirmed_start", row.get(7)?)?,
        confirmed_end: timestamp_opt("meetings.confirmed_end", row.get(8)?)?,
        video_link: row.get(9)?,
        location: row.get(10)?,
        internal_note: row.get(11)?,
        reschedule_count: row.get(12)?,
        created_at: timestamp("meetings.created_at", row.get(13)?)?,
        updated_at: timestamp("meetings.updated_at", row.get(14)?)?,
    })
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

pub(crate) const ASSIGNMENT_COLUMNS: &str =
    "id, matter_id, role, user_id, assigned_by, assigned_at, superseded_at";

pub(crate) fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: decode("assignments.id", &row.get::<_, String>(0)?, AssignmentId::parse)?,
        matter_id: decode("assignments.matter_id", &row.get::<_, String>(1)?, MatterId::parse)?,
        role: decode("assignments.role", &row.get::<_, String>(2)?, AssignmentRole::parse)?,
        user_id: decode("assignments.user_id", &row.get::<_, String>(3)?, |s| UserId::new(s))?,
        assigned_by: decode("assignments.assigned_by", &row.get::<_, String>(4)?, |s| {
            UserId::new(s)
        })?,
        assigned_at: timestamp("assignments.assigned_at", row.get(5)?)?,
        superseded_at: timestamp_opt("assignments.superseded_at", row.get(6)?)?,
    })
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

pub(crate) const HISTORY_COLUMNS: &str = "seq, id, matter_id, actor, occurred_at, payload";

pub(crate) fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEvent> {
    let payload: HistoryPayload =
        serde_json::from_str(&row.get::<_, String>(5)?).map_err(to_from_sql_error)?;
    Ok(HistoryEvent {
        sequence: row.get(0)?,
        id: decode("history_events.id", &row.get::<_, String>(1)?, HistoryEventId::parse)?,
        matter_id: decode(
            "history_events.matter_id",
            &row.get::<_, String>(2)?,
            MatterId::parse,
        )?,
        actor: decode("history_events.actor", &row.get::<_, String>(3)?, |s| UserId::new(s))?,
        action: payload.action(),
        occurred_at: timestamp("history_events.occurred_at", row.get(4)?)?,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_tags_name_the_column() {
        let err = decode("tasks.status", "finished", TaskStatus::parse).unwrap_err();
        assert!(err.to_string().contains("tasks.status"), "{err}");
        assert!(decode_opt("tasks.assignee", None, |s| UserId::new(s)).unwrap().is_none());
    }

    #[test]
    fn timestamps_round_trip_through_micros() {
        let at = Timestamp::parse_rfc3339("2026-03-01T12:30:00.123456Z").unwrap();
        assert_eq!(timestamp("t", at.as_micros()).unwrap(), at);
        assert_eq!(micros(None), None);
    }
}
