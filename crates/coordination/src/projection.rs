//! Rebuilds matter state from its history alone.
//!
//! The current-state tables remain the read path; this fold exists so the
//! timeline can be audited against them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    AssignmentRole, CoordinationError, HistoryEvent, HistoryPayload, LifecycleState, MatterId,
    MeetingId, MeetingStatus, StageId, TaskId, TaskStatus, Timestamp, UserId,
};

/// Task state recoverable from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub stage_id: Option<StageId>,
    pub status: TaskStatus,
    /// `None` until a visibility change is recorded (creation uses defaults).
    pub client_visible: Option<bool>,
}

/// Meeting state recoverable from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingView {
    pub status: MeetingStatus,
    pub proposed_start: Timestamp,
    pub confirmed_start: Option<Timestamp>,
    pub confirmed_end: Option<Timestamp>,
}

/// Matter state folded from its timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatterProjection {
    pub matter_id: Option<MatterId>,
    pub lifecycle: LifecycleState,
    pub current_stage: Option<StageId>,
    pub associate: Option<UserId>,
    pub case_manager: Option<UserId>,
    pub tasks: BTreeMap<TaskId, TaskView>,
    pub meetings: BTreeMap<MeetingId, MeetingView>,
    pub events_applied: usize,
}

impl Default for MatterProjection {
    fn default() -> Self {
        Self {
            matter_id: None,
            lifecycle: LifecycleState::Submitted,
            current_stage: None,
            associate: None,
            case_manager: None,
            tasks: BTreeMap::new(),
            meetings: BTreeMap::new(),
            events_applied: 0,
        }
    }
}

/// Folds `events` (any order) into a [`MatterProjection`].
///
/// # Errors
///
/// Returns [`CoordinationError::Validation`] when events belong to more than
/// one matter or reference a task/meeting before its creation.
pub fn replay(events: &[HistoryEvent]) -> Result<MatterProjection, CoordinationError> {
    let mut ordered: Vec<&HistoryEvent> = events.iter().collect();
    ordered.sort_by_key(|e| (e.occurred_at, e.sequence));

    let mut state = MatterProjection::default();
    for event in ordered {
        match state.matter_id {
            None => state.matter_id = Some(event.matter_id),
            Some(id) if id != event.matter_id => {
                return Err(CoordinationError::validation(format!(
                    "cannot replay events of matter {} into matter {id}",
                    event.matter_id
                )));
            }
            Some(_) => {}
        }
        apply(&mut state, &event.payload)?;
        state.events_applied += 1;
    }
    Ok(state)
}

fn apply(state: &mut MatterProjection, payload: &HistoryPayload) -> Result<(), CoordinationError> {
    match payload {
        HistoryPayload::StageTransitioned {
            to, lifecycle_to, ..
        } => {
            state.current_stage = Some(to.clone());
            state.lifecycle = *lifecycle_to;
        }
        HistoryPayload::TasksMaterialized { stage_id, tasks } => {
            for task in tasks {
                state.tasks.insert(
                    task.task_id,
                    TaskView {
                        stage_id: Some(stage_id.clone()),
                        status: TaskStatus::Pending,
                        client_visible: None,
                    },
                );
            }
        }
        HistoryPayload::TaskCreated {
            task_id, stage_id, ..
        } => {
            state.tasks.insert(
                *task_id,
                TaskView {
                    stage_id: stage_id.clone(),
                    status: TaskStatus::Pending,
                    client_visible: None,
                },
            );
        }
        HistoryPayload::TaskStatusChanged { task_id, to, .. } => {
            task_mut(state, *task_id)?.status = *to;
        }
        HistoryPayload::TaskVisibilityChanged {
            task_id,
            client_visible,
        } => {
            task_mut(state, *task_id)?.client_visible = Some(*client_visible);
        }
        HistoryPayload::MeetingRequested {
            meeting_id,
            proposed_start,
            ..
        } => {
            state.meetings.insert(
                *meeting_id,
                MeetingView {
                    status: MeetingStatus::Requested,
                    proposed_start: *proposed_start,
                    confirmed_start: None,
                    confirmed_end: None,
                },
            );
        }
        HistoryPayload::MeetingAccepted {
            meeting_id,
            confirmed_start,
            confirmed_end,
            ..
        } => {
            let meeting = meeting_mut(state, *meeting_id)?;
            meeting.status = MeetingStatus::Accepted;
            meeting.confirmed_start = Some(*confirmed_start);
            meeting.confirmed_end = Some(*confirmed_end);
        }
        HistoryPayload::MeetingRescheduled {
            meeting_id,
            proposed_start,
            ..
        } => {
            let meeting = meeting_mut(state, *meeting_id)?;
            meeting.status = MeetingStatus::Requested;
            meeting.proposed_start = *proposed_start;
        }
        HistoryPayload::MeetingCancelled { meeting_id, .. } => {
            let meeting = meeting_mut(state, *meeting_id)?;
            meeting.status = MeetingStatus::Cancelled;
            meeting.confirmed_start = None;
            meeting.confirmed_end = None;
        }
        HistoryPayload::MeetingCompleted { meeting_id } => {
            meeting_mut(state, *meeting_id)?.status = MeetingStatus::Completed;
        }
        HistoryPayload::CaseAssigned { role, assignee, .. } => match role {
            AssignmentRole::Associate => state.associate = assignee.clone(),
            AssignmentRole::CaseManager => state.case_manager = assignee.clone(),
        },
        HistoryPayload::LifecycleChanged { to, .. } => state.lifecycle = *to,
        HistoryPayload::MatterClosed { .. } => state.lifecycle = LifecycleState::Closed,
    }
    Ok(())
}

fn task_mut(state: &mut MatterProjection, id: TaskId) -> Result<&mut TaskView, CoordinationError> {
    state
        .tasks
        .get_mut(&id)
        .ok_or_else(|| CoordinationError::validation(format!("task {id} changed before creation")))
}

fn meeting_mut(
    state: &mut MatterProjection,
    id: MeetingId,
) -> Result<&mut MeetingView, CoordinationError> {
    state.meetings.get_mut(&id).ok_or_else(|| {
        CoordinationError::validation(format!("meeting {id} changed before it was requested"))
    })
}
