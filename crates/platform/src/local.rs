//! Stand-ins for running without a platform: everything is allowed and
//! notifications go to the log.

use async_trait::async_trait;
use coordination::{
    Authorizer, Capability, CoordinationError, HistoryEvent, MatterId, NotificationHook, UserId,
};

/// Allows every actor every capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl Authorizer for AllowAllAuthorizer {
    async fn can_act(
        &self,
        actor: &UserId,
        matter: MatterId,
        capability: Capability,
    ) -> Result<bool, CoordinationError> {
        tracing::trace!(matter_id = %matter, actor = %actor, capability = %capability, "allowed locally");
        Ok(true)
    }
}

/// Emits each history event as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationHook for TracingNotifier {
    async fn notify(&self, event: &HistoryEvent) -> Result<(), CoordinationError> {
        tracing::info!(
            event_id = %event.id,
            matter_id = %event.matter_id,
            actor = %event.actor,
            action = %event.action,
            sequence = event.sequence,
            "coordination event"
        );
        Ok(())
    }
}
