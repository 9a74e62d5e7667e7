//! Stage transitions, progress and lifecycle moves.

use coordination::{
    plan_lifecycle, plan_transition, progress, Capability, CoordinationError, HistoryPayload,
    LifecycleState, Matter, MatterId, Mutation, Progress, StageId, Timestamp, UserId,
};

use crate::CoordinationEngine;

impl CoordinationEngine {
    /// Moves a matter onto `target`, which may be any stage of its pipeline.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `NotFound`, `MatterClosed`, `InvalidStageForPipeline`,
    /// or `Conflict` when another writer committed first.
    #[tracing::instrument(skip_all, fields(matter_id = %matter, stage_id = %target, actor = %actor))]
    pub async fn transition(
        &self,
        matter: MatterId,
        target: &StageId,
        actor: &UserId,
    ) -> Result<Matter, CoordinationError> {
        self.authorize(actor, matter, Capability::TransitionStage).await?;
        let current = self.require_matter(matter).await?;
        let pipeline = self.pipeline_of(&current).await?;
        let change = plan_transition(&current, &pipeline, target)?;

        let now = Timestamp::now();
        let mut next = change.apply(&current, now);
        let receipt = self
            .record(
                &current,
                actor,
                vec![Mutation::UpdateMatter(next.clone())],
                HistoryPayload::StageTransitioned {
                    from: change.from,
                    to: change.to,
                    lifecycle_from: change.lifecycle_from,
                    lifecycle_to: change.lifecycle_to,
                },
                now,
            )
            .await?;
        next.version = receipt.version;
        Ok(next)
    }

    /// The display fraction of the pipeline the matter has reached.
    #[tracing::instrument(skip_all, fields(matter_id = %matter))]
    pub async fn progress(&self, matter: MatterId) -> Result<Progress, CoordinationError> {
        let current = self.require_matter(matter).await?;
        let pipeline = self.pipeline_of(&current).await?;
        Ok(progress(&current, &pipeline))
    }

    /// Moves a `submitted` matter to `under_review`.
    #[tracing::instrument(skip_all, fields(matter_id = %matter, actor = %actor))]
    pub async fn begin_review(
        &self,
        matter: MatterId,
        actor: &UserId,
    ) -> Result<Matter, CoordinationError> {
        self.authorize(actor, matter, Capability::ManageLifecycle).await?;
        let current = self.require_matter(matter).await?;
        let to = plan_lifecycle(&current, LifecycleState::UnderReview)?;
        self.change_lifecycle(
            current.clone(),
            to,
            actor,
            HistoryPayload::LifecycleChanged {
                from: current.lifecycle,
                to,
            },
        )
        .await
    }

    /// Closes a matter. Nothing mutates it afterwards.
    #[tracing::instrument(skip_all, fields(matter_id = %matter, actor = %actor))]
    pub async fn close_matter(
        &self,
        matter: MatterId,
        actor: &UserId,
    ) -> Result<Matter, CoordinationError> {
        self.authorize(actor, matter, Capability::ManageLifecycle).await?;
        let current = self.require_matter(matter).await?;
        let to = plan_lifecycle(&current, LifecycleState::Closed)?;
        self.change_lifecycle(
            current.clone(),
            to,
            actor,
            HistoryPayload::MatterClosed {
                previous: current.lifecycle,
            },
        )
        .await
    }

    async fn change_lifecycle(
        &self,
        current: Matter,
        to: LifecycleState,
        actor: &UserId,
        payload: HistoryPayload,
    ) -> Result<Matter, CoordinationError> {
        let now = Timestamp::now();
        let mut next = current.clone();
        next.lifecycle = to;
        next.updated_at = now;
        let receipt = self
            .record(
                &current,
                actor,
                vec![Mutation::UpdateMatter(next.clone())],
                payload,
                now,
            )
            .await?;
        next.version = receipt.version;
        Ok(next)
    }
}
