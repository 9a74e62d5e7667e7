//! Append-only history events.
//!
//! Every committed mutation carries exactly one [`NewHistoryEvent`]. The
//! payload is a closed, tagged enumeration so the timeline can be replayed
//! (see [`crate::projection`]) and rendered without guessing at shapes.

use serde::{Deserialize, Serialize};

use crate::{
    AssignmentRole, HistoryEventId, LifecycleState, MatterId, MeetingId, MeetingKind,
    MeetingStatus, PartyId, StageId, TaskId, TaskStatus, TemplateId, Timestamp, UserId,
};

/// Action tag of a history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    StageTransitioned,
    TasksMaterialized,
    TaskCreated,
    TaskStatusChanged,
    TaskVisibilityChanged,
    MeetingRequested,
    MeetingAccepted,
    MeetingRescheduled,
    MeetingCancelled,
    MeetingCompleted,
    CaseAssigned,
    LifecycleChanged,
    MatterClosed,
}

impl HistoryAction {
    /// Stable tag stored alongside the payload.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StageTransitioned => "stage_transitioned",
            Self::TasksMaterialized => "tasks_materialized",
            Self::TaskCreated => "task_created",
            Self::TaskStatusChanged => "task_status_changed",
            Self::TaskVisibilityChanged => "task_visibility_changed",
            Self::MeetingRequested => "meeting_requested",
            Self::MeetingAccepted => "meeting_accepted",
            Self::MeetingRescheduled => "meeting_rescheduled",
            Self::MeetingCancelled => "meeting_cancelled",
            Self::MeetingCompleted => "meeting_completed",
            Self::CaseAssigned => "case_assigned",
            Self::LifecycleChanged => "lifecycle_changed",
            Self::MatterClosed => "matter_closed",
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one task created by a materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedTask {
    pub task_id: TaskId,
    pub template_id: TemplateId,
    pub title: String,
}

/// Action-specific structured payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum HistoryPayload {
    StageTransitioned {
        from: Option<StageId>,
        to: StageId,
        lifecycle_from: LifecycleState,
        lifecycle_to: LifecycleState,
    },
    TasksMaterialized {
        stage_id: StageId,
        /// Empty when every template was already materialized.
        tasks: Vec<MaterializedTask>,
    },
    TaskCreated {
        task_id: TaskId,
        stage_id: Option<StageId>,
        title: String,
    },
    TaskStatusChanged {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
    TaskVisibilityChanged {
        task_id: TaskId,
        client_visible: bool,
    },
    MeetingRequested {
        meeting_id: MeetingId,
        kind: MeetingKind,
        external_party: PartyId,
        proposed_start: Timestamp,
    },
    MeetingAccepted {
        meeting_id: MeetingId,
        confirmed_start: Timestamp,
        confirmed_end: Timestamp,
        video_link: Option<String>,
    },
    MeetingRescheduled {
        meeting_id: MeetingId,
        previous_start: Timestamp,
        proposed_start: Timestamp,
        note: String,
    },
    MeetingCancelled {
        meeting_id: MeetingId,
        previous_status: MeetingStatus,
    },
    MeetingCompleted {
        meeting_id: MeetingId,
    },
    CaseAssigned {
        role: AssignmentRole,
        previous: Option<UserId>,
        assignee: Option<UserId>,
        /// `true` when the same user was re-assigned and no registry row changed.
        unchanged: bool,
    },
    LifecycleChanged {
        from: LifecycleState,
        to: LifecycleState,
    },
    MatterClosed {
        previous: LifecycleState,
    },
}

impl HistoryPayload {
    /// The action tag for this payload.
    pub fn action(&self) -> HistoryAction {
        match self {
            Self::StageTransitioned { .. } => HistoryAction::StageTransitioned,
            Self::TasksMaterialized { .. } => HistoryAction::TasksMaterialized,
            Self::TaskCreated { .. } => HistoryAction::TaskCreated,
            Self::TaskStatusChanged { .. } => HistoryAction::TaskStatusChanged,
            Self::TaskVisibilityChanged { .. } => HistoryAction::TaskVisibilityChanged,
            Self::MeetingRequested { .. } => HistoryAction::MeetingRequested,
            Self::MeetingAccepted { .. } => HistoryAction::MeetingAccepted,
            Self::MeetingRescheduled { .. } => HistoryAction::MeetingRescheduled,
            Self::MeetingCancelled { .. } => HistoryAction::MeetingCancelled,
            Self::MeetingCompleted { .. } => HistoryAction::MeetingCompleted,
            Self::CaseAssigned { .. } => HistoryAction::CaseAssigned,
            Self::LifecycleChanged { .. } => HistoryAction::LifecycleChanged,
            Self::MatterClosed { .. } => HistoryAction::MatterClosed,
        }
    }
}

/// An event about to be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryEvent {
    pub id: HistoryEventId,
    pub matter_id: MatterId,
    pub actor: UserId,
    pub occurred_at: Timestamp,
    pub payload: HistoryPayload,
}

impl NewHistoryEvent {
    /// Stamps a fresh id and the given time onto `payload`.
    pub fn new(
        matter_id: MatterId,
        actor: UserId,
        payload: HistoryPayload,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            id: HistoryEventId::new_random(),
            matter_id,
            actor,
            occurred_at,
            payload,
        }
    }
}

/// A persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: HistoryEventId,
    /// Store-wide insertion order; breaks timestamp ties.
    pub sequence: i64,
    pub matter_id: MatterId,
    pub actor: UserId,
    pub action: HistoryAction,
    pub occurred_at: Timestamp,
    pub payload: HistoryPayload,
}

impl From<(i64, NewHistoryEvent)> for HistoryEvent {
    fn from((sequence, event): (i64, NewHistoryEvent)) -> Self {
        Self {
            id: event.id,
            sequence,
            matter_id: event.matter_id,
            actor: event.actor,
            action: event.payload.action(),
            occurred_at: event.occurred_at,
            payload: event.payload,
        }
    }
}
