//! The single write path: one IMMEDIATE transaction per [`MatterCommit`].

use coordination::{
    AssignmentId, AssignmentRole, CommitReceipt, CoordinationError, EntityKind, HistoryEvent,
    MatterCommit, MatterId, Meeting, Mutation, Task, Timestamp, UserId,
};
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};

use crate::codec::{micros, text};
use crate::StoreError;

pub(crate) fn apply(
    conn: &mut rusqlite::Connection,
    commit: MatterCommit,
) -> Result<CommitReceipt, CoordinationError> {
    let MatterCommit {
        matter_id,
        expected_version,
        mutations,
        event,
    } = commit;

    if event.matter_id != matter_id {
        return Err(CoordinationError::validation(format!(
            "history event for matter {} cannot be committed against matter {matter_id}",
            event.matter_id
        )));
    }

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(StoreError::from)?;

    let updated = tx
        .execute(
            "UPDATE matters SET version = version + 1 WHERE id = ?1 AND version = ?2",
            params![matter_id.to_string(), expected_version],
        )
        .map_err(StoreError::from)?;
    if updated == 0 {
        let actual: Option<i64> = tx
            .query_row(
                "SELECT version FROM matters WHERE id = ?1",
                params![matter_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)?;
        return Err(match actual {
            None => CoordinationError::not_found(EntityKind::Matter, matter_id),
            Some(actual) => CoordinationError::Conflict {
                matter: matter_id,
                expected: expected_version,
                actual,
            },
        });
    }

    for mutation in &mutations {
        if let Err(err) = apply_mutation(&tx, matter_id, mutation) {
            return Err(match err {
                MutationError::Store(err) if err.is_unique_violation() => {
                    CoordinationError::Conflict {
                        matter: matter_id,
                        expected: expected_version,
                        actual: expected_version,
                    }
                }
                MutationError::Store(err) => err.into(),
                MutationError::Domain(err) => err,
            });
        }
    }

    let payload = serde_json::to_string(&event.payload).map_err(StoreError::from)?;
    tx.execute(
        "INSERT INTO history_events (id, matter_id, actor, action, occurred_at, payload) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.id.to_string(),
            matter_id.to_string(),
            event.actor.as_str(),
            event.payload.action().as_str(),
            event.occurred_at.as_micros(),
            payload,
        ],
    )
    .map_err(StoreError::from)?;
    let sequence = tx.last_insert_rowid();

    tx.commit().map_err(StoreError::from)?;

    let version = expected_version + 1;
    tracing::debug!(
        matter_id = %matter_id,
        version,
        sequence,
        action = %event.payload.action(),
        mutations = mutations.len(),
        "matter commit applied"
    );
    Ok(CommitReceipt {
        version,
        event: HistoryEvent::from((sequence, event)),
    })
}

enum MutationError {
    Store(StoreError),
    Domain(CoordinationError),
}

impl From<rusqlite::Error> for MutationError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::from(err))
    }
}

fn ensure_owned(
    kind: &str,
    owner: MatterId,
    matter_id: MatterId,
) -> Result<(), MutationError> {
    if owner == matter_id {
        return Ok(());
    }
    Err(MutationError::Domain(CoordinationError::validation(format!(
        "{kind} of matter {owner} cannot be written under matter {matter_id}"
    ))))
}

fn apply_mutation(
    tx: &Transaction<'_>,
    matter_id: MatterId,
    mutation: &Mutation,
) -> Result<(), MutationError> {
    match mutation {
        Mutation::UpdateMatter(matter) => {
            ensure_owned("matter row", matter.id, matter_id)?;
            tx.execute(
                "UPDATE matters SET firm_id = ?2, lifecycle = ?3, current_stage = ?4, \
                 pipeline_id = ?5, assigned_associate = ?6, assigned_case_manager = ?7, \
                 internal_notes = ?8, updated_at = ?9 WHERE id = ?1",
                params![
                    matter.id.to_string(),
                    matter.firm_id.as_str(),
                    matter.lifecycle.as_str(),
                    text(matter.current_stage.as_ref()),
                    matter.pipeline_id.as_str(),
                    text(matter.assigned_associate.as_ref()),
                    text(matter.assigned_case_manager.as_ref()),
                    matter.internal_notes,
                    matter.updated_at.as_micros(),
                ],
            )?;
        }
        Mutation::InsertTasks(tasks) => {
            for task in tasks {
                ensure_owned("task", task.matter_id, matter_id)?;
                insert_task(tx, task)?;
            }
        }
        Mutation::UpdateTask(task) => {
            ensure_owned("task", task.matter_id, matter_id)?;
            let updated = tx.execute(
                "UPDATE tasks SET title = ?2, description = ?3, status = ?4, priority = ?5, \
                 due_at = ?6, client_visible = ?7, required = ?8, assignee = ?9, \
                 updated_at = ?10 WHERE id = ?1 AND matter_id = ?11",
                params![
                    task.id.to_string(),
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.priority.as_str(),
                    micros(task.due_at),
                    task.client_visible,
                    task.required,
                    text(task.assignee.as_ref()),
                    task.updated_at.as_micros(),
                    matter_id.to_string(),
                ],
            )?;
            if updated == 0 {
                return Err(MutationError::Domain(CoordinationError::not_found(
                    EntityKind::Task,
                    task.id,
                )));
            }
        }
        Mutation::InsertMeeting(meeting) => {
            ensure_owned("meeting", meeting.matter_id, matter_id)?;
            insert_meeting(tx, meeting)?;
        }
        Mutation::UpdateMeeting(meeting) => {
            ensure_owned("meeting", meeting.matter_id, matter_id)?;
            let updated = tx.execute(
                "UPDATE meetings SET status = ?2, proposed_start = ?3, confirmed_start = ?4, \
                 confirmed_end = ?5, video_link = ?6, location = ?7, internal_note = ?8, \
                 reschedule_count = ?9, updated_at = ?10 WHERE id = ?1 AND matter_id = ?11",
                params![
                    meeting.id.to_string(),
                    meeting.status.as_str(),
                    meeting.proposed_start.as_micros(),
                    micros(meeting.confirmed_start),
                    micros(meeting.confirmed_end),
                    meeting.video_link,
                    meeting.location,
                    meeting.internal_note,
                    meeting.reschedule_count,
                    meeting.updated_at.as_micros(),
                    matter_id.to_string(),
                ],
            )?;
            if updated == 0 {
                return Err(MutationError::Domain(CoordinationError::not_found(
                    EntityKind::Meeting,
                    meeting.id,
                )));
            }
        }
        Mutation::Assign {
            role,
            user,
            assigned_by,
            at,
        } => assign(tx, matter_id, *role, user.as_ref(), assigned_by, *at)?,
    }
    Ok(())
}

fn insert_task(tx: &Transaction<'_>, task: &Task) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO tasks (id, matter_id, stage_id, template_id, origin, title, description, \
         status, priority, due_at, client_visible, required, assignee, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            task.id.to_string(),
            task.matter_id.to_string(),
            text(task.stage_id.as_ref()),
            text(task.origin.template_id()),
            task.origin.as_tag(),
            task.title,
            task.description,
            task.status.as_str(),
            task.priority.as_str(),
            micros(task.due_at),
            task.client_visible,
            task.required,
            text(task.assignee.as_ref()),
            task.created_at.as_micros(),
            task.updated_at.as_micros(),
        ],
    )?;
    Ok(())
}

fn insert_meeting(tx: &Transaction<'_>, meeting: &Meeting) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO meetings (id, matter_id, internal_party, external_party, kind, status, \
         proposed_start, confirmed_start, confirmed_end, video_link, location, internal_note, \
         reschedule_count, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            meeting.id.to_string(),
            meeting.matter_id.to_string(),
            meeting.internal_party.as_str(),
            meeting.external_party.as_str(),
            meeting.kind.as_str(),
            meeting.status.as_str(),
            meeting.proposed_start.as_micros(),
            micros(meeting.confirmed_start),
            micros(meeting.confirmed_end),
            meeting.video_link,
            meeting.location,
            meeting.internal_note,
            meeting.reschedule_count,
            meeting.created_at.as_micros(),
            meeting.updated_at.as_micros(),
        ],
    )?;
    Ok(())
}

fn assign(
    tx: &Transaction<'_>,
    matter_id: MatterId,
    role: AssignmentRole,
    user: Option<&UserId>,
    assigned_by: &UserId,
    at: Timestamp,
) -> rusqlite::Result<()> {
    tx.execute(
        "UPDATE assignments SET superseded_at = ?3 \
         WHERE matter_id = ?1 AND role = ?2 AND superseded_at IS NULL",
        params![matter_id.to_string(), role.as_str(), at.as_micros()],
    )?;
    if let Some(user) = user {
        tx.execute(
            "INSERT INTO assignments (id, matter_id, role, user_id, assigned_by, assigned_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                AssignmentId::new_random().to_string(),
                matter_id.to_string(),
                role.as_str(),
                user.as_str(),
                assigned_by.as_str(),
                at.as_micros(),
            ],
        )?;
    }
    Ok(())
}
