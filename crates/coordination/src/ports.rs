//! Port traits implemented by infrastructure crates.
//!
//! The engine depends only on these traits. `store` supplies the relational
//! [`CoordinationStore`] and [`PipelineCatalog`]; `platform` supplies the
//! [`Authorizer`] and [`NotificationHook`] collaborators.

use async_trait::async_trait;

use crate::{
    Assignment, AssignmentRole, Capability, CoordinationError, HistoryEvent, Matter, MatterId,
    Meeting, MeetingId, NewHistoryEvent, Pipeline, PipelineId, StageId, Task, TaskId,
    TaskTemplate, Timestamp, UserId,
};

// ---------------------------------------------------------------------------
// Commit unit
// ---------------------------------------------------------------------------

/// One change applied inside a [`MatterCommit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Overwrite the matter row (its `version` field is ignored; the store sets it).
    UpdateMatter(Matter),
    /// Insert new tasks. A materialized task colliding with an existing
    /// (matter, stage, template) triple aborts the commit with `Conflict`.
    InsertTasks(Vec<Task>),
    UpdateTask(Task),
    InsertMeeting(Meeting),
    UpdateMeeting(Meeting),
    /// Supersede the current holder of `role`, then record `user` (if any) as
    /// the new holder.
    Assign {
        role: AssignmentRole,
        user: Option<UserId>,
        assigned_by: UserId,
        at: Timestamp,
    },
}

/// Everything one operation writes, applied atomically under the matter's
/// optimistic version.
#[derive(Debug, Clone, PartialEq)]
pub struct MatterCommit {
    pub matter_id: MatterId,
    /// The version the operation read; the commit fails with `Conflict` if it moved.
    pub expected_version: i64,
    pub mutations: Vec<Mutation>,
    /// The paired history event. Never optional.
    pub event: NewHistoryEvent,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    /// The matter's version after the commit.
    pub version: i64,
    pub event: HistoryEvent,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Relational persistence for matters, tasks, meetings, assignments and history.
///
/// Reads are unsynchronised snapshots. Writes go through [`CoordinationStore::commit`] only.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn load_matter(&self, id: MatterId) -> Result<Option<Matter>, CoordinationError>;

    /// Tasks of a matter, restricted to `stage` when given, in creation order.
    async fn load_tasks(
        &self,
        matter: MatterId,
        stage: Option<&StageId>,
    ) -> Result<Vec<Task>, CoordinationError>;

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>, CoordinationError>;

    async fn load_meeting(&self, id: MeetingId) -> Result<Option<Meeting>, CoordinationError>;

    async fn load_meetings(&self, matter: MatterId) -> Result<Vec<Meeting>, CoordinationError>;

    /// The non-superseded assignment row for `role`, if any.
    async fn current_assignment(
        &self,
        matter: MatterId,
        role: AssignmentRole,
    ) -> Result<Option<Assignment>, CoordinationError>;

    /// Every assignment row for `role`, oldest first.
    async fn assignment_history(
        &self,
        matter: MatterId,
        role: AssignmentRole,
    ) -> Result<Vec<Assignment>, CoordinationError>;

    /// History of a matter, newest first (timestamp, then insertion sequence).
    async fn timeline(&self, matter: MatterId) -> Result<Vec<HistoryEvent>, CoordinationError>;

    /// Applies `commit` atomically: version check and increment, mutations,
    /// history append. Nothing is written unless everything is.
    async fn commit(&self, commit: MatterCommit) -> Result<CommitReceipt, CoordinationError>;
}

/// Read-only access to pipeline and template configuration.
#[async_trait]
pub trait PipelineCatalog: Send + Sync {
    async fn pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>, CoordinationError>;

    async fn templates_for_stage(
        &self,
        stage: &StageId,
    ) -> Result<Vec<TaskTemplate>, CoordinationError>;
}

/// The platform's `CanAct(actor, matter, capability)` check.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn can_act(
        &self,
        actor: &UserId,
        matter: MatterId,
        capability: Capability,
    ) -> Result<bool, CoordinationError>;
}

/// Invoked after every committed history append. Failures never roll back
/// the mutation.
#[async_trait]
pub trait NotificationHook: Send + Sync {
    async fn notify(&self, event: &HistoryEvent) -> Result<(), CoordinationError>;
}
