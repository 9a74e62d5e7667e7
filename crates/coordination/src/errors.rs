//! Top-level error and retry-policy types for the coordination domain.
//!
//! [`CoordinationError`] is the single error every engine operation returns.
//! Infrastructure crates keep their own local error types and convert into it
//! at the port boundary, so callers only ever match on one taxonomy.
//!
//! [`RetryPolicy`] is a cross-cutting concern: the caller-level retry helper in
//! the `engine` crate consults it to decide whether re-issuing an operation is
//! safe.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Capability, MatterId, PipelineId, StageId, UserId};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable` errors: optimistic-concurrency conflicts, transient storage
///   failures (busy/locked database), platform timeouts.
/// - `NonRetryable` errors: everything that reflects a violated precondition.
///   Re-issuing the same request would fail the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Entity kinds (for NotFound)
// ---------------------------------------------------------------------------

/// The kind of record a [`CoordinationError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Matter,
    Pipeline,
    Stage,
    Task,
    Meeting,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Matter => "matter",
            Self::Pipeline => "pipeline",
            Self::Stage => "stage",
            Self::Task => "task",
            Self::Meeting => "meeting",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// Fieldless discriminant of [`CoordinationError`].
///
/// Presentation layers map each kind to a distinct user-facing message; for
/// example `Unauthorized` prompts re-authentication instead of being shown as
/// a data error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidStageForPipeline,
    InvalidTransition,
    MatterClosed,
    Conflict,
    Unauthorized,
    Validation,
    Storage,
    Platform,
    Configuration,
}

// ---------------------------------------------------------------------------
// Coordination errors
// ---------------------------------------------------------------------------

/// Errors returned by coordination operations.
///
/// All variants are local, synchronous failures. None are retried by the
/// engine itself; see [`CoordinationError::retry_policy`].
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum CoordinationError {
    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of the missing record.
        entity: EntityKind,
        /// Identifier as supplied by the caller.
        id: String,
    },

    /// The target stage is not part of the matter's pipeline.
    #[error("stage '{stage}' does not belong to pipeline '{pipeline}'")]
    InvalidStageForPipeline {
        /// Stage the caller targeted.
        stage: StageId,
        /// Pipeline the matter is on.
        pipeline: PipelineId,
    },

    /// The current status of a meeting or matter does not allow the operation.
    #[error("cannot {operation} from state '{state}'")]
    InvalidTransition {
        /// Operation that was attempted (e.g. `"accept meeting"`).
        operation: String,
        /// Status tag the record was in.
        state: String,
    },

    /// The matter is closed; closed matters are never mutated.
    #[error("matter {matter} is closed")]
    MatterClosed {
        /// The closed matter.
        matter: MatterId,
    },

    /// Another writer committed to the same matter first.
    ///
    /// Safe to retry immediately: the retried operation re-reads current state.
    #[error("concurrent update on matter {matter} (expected version {expected}, found {actual})")]
    Conflict {
        /// Matter whose version moved.
        matter: MatterId,
        /// Version the operation read.
        expected: i64,
        /// Version found at commit time (`expected` when a uniqueness guard fired).
        actual: i64,
    },

    /// The authorization collaborator refused the capability.
    #[error("{actor} is not authorized to {capability} on matter {matter}")]
    Unauthorized {
        /// Acting user.
        actor: UserId,
        /// Matter the operation targeted.
        matter: MatterId,
        /// Capability that was checked.
        capability: Capability,
    },

    /// Input failed validation (e.g. a virtual meeting accepted without a video link).
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the invalid input.
        message: String,
    },

    /// The persistence layer failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description from the storage adapter.
        message: String,
        /// `true` when the failure is expected to clear on retry (busy/locked).
        transient: bool,
    },

    /// The external platform (authorization) could not be reached or answered badly.
    #[error("platform error: {message}")]
    Platform {
        /// Description from the platform adapter.
        message: String,
    },

    /// Catalog or runtime configuration is invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl CoordinationError {
    /// Shorthand for [`CoordinationError::NotFound`].
    pub fn not_found(entity: EntityKind, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`CoordinationError::InvalidTransition`].
    pub fn invalid_transition(operation: &str, state: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            operation: operation.to_string(),
            state: state.to_string(),
        }
    }

    /// Shorthand for [`CoordinationError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`CoordinationError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the fieldless kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidStageForPipeline { .. } => ErrorKind::InvalidStageForPipeline,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::MatterClosed { .. } => ErrorKind::MatterClosed,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Platform { .. } => ErrorKind::Platform,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns whether the caller may safely re-issue the failed operation.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Conflict { .. } => RetryPolicy::Retryable { after: None },
            Self::Storage {
                transient: true, ..
            } => RetryPolicy::Retryable {
                after: Some(Duration::from_millis(25)),
            },
            _ => RetryPolicy::NonRetryable,
        }
    }
}
