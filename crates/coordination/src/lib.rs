//! Core domain for the Matterflow coordination engine.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, pure transition rule, and cross-cutting error type used throughout
//! the workspace. Infrastructure crates implement the traits defined in
//! [`ports`]; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`MatterId`, `StageId`, etc.) |
//! | [`types`] | Shared value types (`Timestamp`, `Progress`, status enumerations) |
//! | [`errors`] | Top-level error and retry-policy types |
//! | [`catalog`] | Pipelines, stages and task templates |
//! | [`matter`] | Matter record, stage-transition and lifecycle rules, progress |
//! | [`task`] | Tasks, origins and the materialization plan |
//! | [`meeting`] | Meetings and the negotiation state machine |
//! | [`assignment`] | Assignment registry rows |
//! | [`history`] | History actions, payloads and events |
//! | [`projection`] | Replay of a timeline into matter state |
//! | [`ports`] | Store, catalog, authorization and notification traits |

pub mod assignment;
pub mod catalog;
pub mod errors;
pub mod history;
pub mod identifiers;
pub mod matter;
pub mod meeting;
pub mod ports;
pub mod projection;
pub mod task;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use assignment::Assignment;
pub use catalog::{Pipeline, Stage, TaskTemplate};
pub use errors::{CoordinationError, EntityKind, ErrorKind, RetryPolicy};
pub use history::{
    HistoryAction, HistoryEvent, HistoryPayload, MaterializedTask, NewHistoryEvent,
};
pub use identifiers::{
    AssignmentId, FirmId, HistoryEventId, MatterId, MeetingId, PartyId, PipelineId, StageId,
    TaskId, TemplateId, UserId,
};
pub use matter::{plan_lifecycle, plan_transition, progress, Matter, StageChange};
pub use meeting::{
    Acceptance, Meeting, MeetingRequest, DEFAULT_SESSION_LENGTH_MINUTES, MAX_SESSION_LENGTH_MINUTES,
};
pub use ports::{
    Authorizer, CommitReceipt, CoordinationStore, MatterCommit, Mutation, NotificationHook,
    PipelineCatalog,
};
pub use projection::{replay, MatterProjection, MeetingView, TaskView};
pub use task::{plan_materialization, DedupMode, NewTask, Task, TaskOrigin};
pub use types::{
    AssignmentRole, Capability, LifecycleState, MeetingKind, MeetingStatus, Progress,
    TaskPriority, TaskStatus, Timestamp,
};
