//! Coordination history: the append step shared by every mutation, the
//! timeline read, and replay of a timeline into matter state.

use std::sync::{Arc, PoisonError};

use coordination::{
    replay, CommitReceipt, CoordinationError, HistoryEvent, HistoryPayload, Matter, MatterCommit,
    MatterId, MatterProjection, Mutation, NewHistoryEvent, Timestamp, UserId,
};
use tracing::Instrument;

use crate::CoordinationEngine;

impl CoordinationEngine {
    /// Commits `mutations` with the event built from `payload` under the
    /// version `matter` was read at, then notifies in the background.
    pub(crate) async fn record(
        &self,
        matter: &Matter,
        actor: &UserId,
        mutations: Vec<Mutation>,
        payload: HistoryPayload,
        now: Timestamp,
    ) -> Result<CommitReceipt, CoordinationError> {
        let event = NewHistoryEvent::new(matter.id, actor.clone(), payload, now);
        let receipt = self
            .store
            .commit(MatterCommit {
                matter_id: matter.id,
                expected_version: matter.version,
                mutations,
                event,
            })
            .await?;
        tracing::info!(
            matter_id = %matter.id,
            actor = %actor,
            action = %receipt.event.action,
            version = receipt.version,
            "history appended"
        );
        self.notify(receipt.event.clone());
        Ok(receipt)
    }

    /// Hands `event` to the notification hook without waiting for it.
    fn notify(&self, event: HistoryEvent) {
        let hook = Arc::clone(&self.notifier);
        let span = tracing::debug_span!("notify", matter_id = %event.matter_id, action = %event.action);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while pending.try_join_next().is_some() {}
        pending.spawn(
            async move {
                if let Err(err) = hook.notify(&event).await {
                    tracing::warn!(event_id = %event.id, error = %err, "notification hook failed");
                }
            }
            .instrument(span),
        );
    }

    /// Waits for every notification handed off so far.
    pub async fn drain_notifications(&self) {
        let mut in_flight = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *pending)
        };
        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = joined {
                tracing::warn!(error = %err, "notification task did not complete");
            }
        }
    }

    /// The matter's history, newest first.
    #[tracing::instrument(skip_all, fields(matter_id = %matter))]
    pub async fn timeline(&self, matter: MatterId) -> Result<Vec<HistoryEvent>, CoordinationError> {
        self.require_matter(matter).await?;
        self.store.timeline(matter).await
    }

    /// Folds the matter's timeline back into state.
    #[tracing::instrument(skip_all, fields(matter_id = %matter))]
    pub async fn projection(&self, matter: MatterId) -> Result<MatterProjection, CoordinationError> {
        let events = self.timeline(matter).await?;
        replay(&events)
    }
}
