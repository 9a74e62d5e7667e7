//! Assignment registry: who is, and was, responsible for a matter.

use coordination::{
    Assignment, AssignmentRole, Capability, CoordinationError, HistoryPayload, Matter, MatterId,
    Mutation, Timestamp, UserId,
};

use crate::CoordinationEngine;

impl CoordinationEngine {
    /// Makes `user` the holder of `role`; `None` clears the role.
    ///
    /// Re-assigning the current holder leaves the rows untouched but still
    /// records a `case_assigned` event marked `unchanged`.
    #[tracing::instrument(skip_all, fields(matter_id = %matter, role = %role, actor = %actor))]
    pub async fn assign(
        &self,
        matter: MatterId,
        role: AssignmentRole,
        user: Option<UserId>,
        actor: &UserId,
    ) -> Result<Matter, CoordinationError> {
        self.authorize(actor, matter, Capability::AssignCase).await?;
        let current = self.require_open_matter(matter).await?;

        let previous = current.assignee(role).cloned();
        let unchanged = previous == user;
        let now = Timestamp::now();
        let mut next = current.clone();
        let mutations = if unchanged {
            Vec::new()
        } else {
            next.set_assignee(role, user.clone());
            next.updated_at = now;
            vec![
                Mutation::UpdateMatter(next.clone()),
                Mutation::Assign {
                    role,
                    user: user.clone(),
                    assigned_by: actor.clone(),
                    at: now,
                },
            ]
        };

        let receipt = self
            .record(
                &current,
                actor,
                mutations,
                HistoryPayload::CaseAssigned {
                    role,
                    previous,
                    assignee: user,
                    unchanged,
                },
                now,
            )
            .await?;
        next.version = receipt.version;
        Ok(next)
    }

    /// The current holder of `role`, if any.
    pub async fn current_assignee(
        &self,
        matter: MatterId,
        role: AssignmentRole,
    ) -> Result<Option<UserId>, CoordinationError> {
        self.require_matter(matter).await?;
        let current = self.store.current_assignment(matter, role).await?;
        Ok(current.map(|row| row.user_id))
    }

    /// Every assignment row for `role`, superseded ones included, oldest first.
    pub async fn assignment_history(
        &self,
        matter: MatterId,
        role: AssignmentRole,
    ) -> Result<Vec<Assignment>, CoordinationError> {
        self.require_matter(matter).await?;
        self.store.assignment_history(matter, role).await
    }
}
