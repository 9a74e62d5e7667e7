//! The matter record and the stage-transition rules that apply to it.
//!
//! Transition rules are pure: [`plan_transition`] validates a requested move
//! against the matter and its pipeline, and [`StageChange::apply`] produces the
//! updated record. Persisting the result is the caller's job.

use serde::{Deserialize, Serialize};

use crate::{
    AssignmentRole, CoordinationError, FirmId, LifecycleState, MatterId, Pipeline, PipelineId,
    Progress, StageId, Timestamp, UserId,
};

/// One legal matter tracked end-to-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matter {
    pub id: MatterId,
    pub firm_id: FirmId,
    pub lifecycle: LifecycleState,
    /// `None` until the matter is placed on its pipeline.
    pub current_stage: Option<StageId>,
    pub pipeline_id: PipelineId,
    pub assigned_associate: Option<UserId>,
    pub assigned_case_manager: Option<UserId>,
    /// Opaque blob owned by the note-editing collaborator.
    pub internal_notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Optimistic concurrency counter, incremented by every committed mutation.
    pub version: i64,
}

impl Matter {
    /// Builds the record the intake process hands over: `submitted`, no stage,
    /// nobody assigned.
    pub fn from_intake(firm_id: FirmId, pipeline_id: PipelineId, now: Timestamp) -> Self {
        Self {
            id: MatterId::new_random(),
            firm_id,
            lifecycle: LifecycleState::Submitted,
            current_stage: None,
            pipeline_id,
            assigned_associate: None,
            assigned_case_manager: None,
            internal_notes: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Fails with [`CoordinationError::MatterClosed`] when the matter is closed.
    pub fn ensure_open(&self) -> Result<(), CoordinationError> {
        if self.lifecycle.is_closed() {
            Err(CoordinationError::MatterClosed { matter: self.id })
        } else {
            Ok(())
        }
    }

    /// The user currently holding `role`, as denormalized on the matter row.
    pub fn assignee(&self, role: AssignmentRole) -> Option<&UserId> {
        match role {
            AssignmentRole::Associate => self.assigned_associate.as_ref(),
            AssignmentRole::CaseManager => self.assigned_case_manager.as_ref(),
        }
    }

    /// Sets the denormalized holder of `role`.
    pub fn set_assignee(&mut self, role: AssignmentRole, user: Option<UserId>) {
        match role {
            AssignmentRole::Associate => self.assigned_associate = user,
            AssignmentRole::CaseManager => self.assigned_case_manager = user,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage transitions
// ---------------------------------------------------------------------------

/// A validated move of a matter onto a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChange {
    pub from: Option<StageId>,
    pub to: StageId,
    pub lifecycle_from: LifecycleState,
    pub lifecycle_to: LifecycleState,
}

impl StageChange {
    /// Returns the matter as it stands after the change.
    pub fn apply(&self, matter: &Matter, now: Timestamp) -> Matter {
        let mut next = matter.clone();
        next.current_stage = Some(self.to.clone());
        next.lifecycle = self.lifecycle_to;
        next.updated_at = now;
        next
    }
}

/// Validates moving `matter` onto `target`.
///
/// Any stage of the matter's pipeline is a legal target, regardless of its
/// ordinal relative to the current stage. Entering a stage while the matter is
/// still `submitted` or `under_review` advances it to `in_progress`.
///
/// # Errors
///
/// - [`CoordinationError::MatterClosed`] for a closed matter.
/// - [`CoordinationError::Configuration`] when `pipeline` is not the matter's pipeline.
/// - [`CoordinationError::InvalidStageForPipeline`] when `target` is not in the pipeline.
pub fn plan_transition(
    matter: &Matter,
    pipeline: &Pipeline,
    target: &StageId,
) -> Result<StageChange, CoordinationError> {
    matter.ensure_open()?;
    if pipeline.id() != &matter.pipeline_id {
        return Err(CoordinationError::configuration(format!(
            "matter {} is on pipeline '{}', not '{}'",
            matter.id,
            matter.pipeline_id,
            pipeline.id()
        )));
    }
    if !pipeline.contains(target) {
        return Err(CoordinationError::InvalidStageForPipeline {
            stage: target.clone(),
            pipeline: matter.pipeline_id.clone(),
        });
    }
    let lifecycle_to = match matter.lifecycle {
        LifecycleState::Submitted | LifecycleState::UnderReview => LifecycleState::InProgress,
        other => other,
    };
    Ok(StageChange {
        from: matter.current_stage.clone(),
        to: target.clone(),
        lifecycle_from: matter.lifecycle,
        lifecycle_to,
    })
}

/// Display fraction `(ordinal(current) + 1) / len(stages)`; zero off-pipeline.
///
/// A current stage that is no longer in the pipeline also reports zero.
pub fn progress(matter: &Matter, pipeline: &Pipeline) -> Progress {
    let Some(stage) = matter
        .current_stage
        .as_ref()
        .and_then(|id| pipeline.stage(id))
    else {
        return Progress::zero();
    };
    let total = pipeline.stages().len() as f64;
    Progress::new((f64::from(stage.ordinal) + 1.0) / total).unwrap_or_else(Progress::zero)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Validates a lifecycle move requested outside a stage transition.
///
/// Only `submitted → under_review` and `<any open> → closed` are accepted here.
pub fn plan_lifecycle(
    matter: &Matter,
    to: LifecycleState,
) -> Result<LifecycleState, CoordinationError> {
    matter.ensure_open()?;
    match (matter.lifecycle, to) {
        (LifecycleState::Submitted, LifecycleState::UnderReview) => Ok(to),
        (_, LifecycleState::Closed) => Ok(to),
        (from, to) => Err(CoordinationError::invalid_transition(
            &format!("move matter to {to}"),
            from,
        )),
    }
}
