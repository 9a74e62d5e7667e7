//! The engine value and the steps every operation shares.
//!
//! Each mutating operation runs the same sequence: authorize the actor,
//! read current state, apply a pure rule from `coordination`, commit the
//! mutation together with its history event, then notify.

use std::sync::{Arc, Mutex};

use coordination::{
    Authorizer, Capability, CoordinationError, CoordinationStore, EntityKind, Matter, MatterId,
    NotificationHook, Pipeline, PipelineCatalog, UserId,
};

use tokio::task::JoinSet;

use crate::{CachedCatalog, EngineSettings};

/// Coordinates stage transitions, task materialization, meeting negotiation,
/// history and assignments over the injected ports.
///
/// Clones share the catalog cache and the set of in-flight notifications.
/// Dropping the last clone aborts notifications that have not finished; call
/// [`CoordinationEngine::drain_notifications`] first when they must land.
#[derive(Clone)]
pub struct CoordinationEngine {
    pub(crate) store: Arc<dyn CoordinationStore>,
    pub(crate) catalog: CachedCatalog,
    pub(crate) authorizer: Arc<dyn Authorizer>,
    pub(crate) notifier: Arc<dyn NotificationHook>,
    pub(crate) settings: EngineSettings,
    pub(crate) pending: Arc<Mutex<JoinSet<()>>>,
}

impl CoordinationEngine {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        catalog: Arc<dyn PipelineCatalog>,
        authorizer: Arc<dyn Authorizer>,
        notifier: Arc<dyn NotificationHook>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            catalog: CachedCatalog::new(catalog, settings.catalog_cache_capacity),
            authorizer,
            notifier,
            settings,
            pending: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The cached catalog, for callers that need to invalidate it.
    pub fn catalog(&self) -> &CachedCatalog {
        &self.catalog
    }

    pub(crate) async fn authorize(
        &self,
        actor: &UserId,
        matter: MatterId,
        capability: Capability,
    ) -> Result<(), CoordinationError> {
        if self.authorizer.can_act(actor, matter, capability).await? {
            return Ok(());
        }
        tracing::warn!(
            matter_id = %matter,
            actor = %actor,
            capability = %capability,
            "actor refused by authorizer"
        );
        Err(CoordinationError::Unauthorized {
            actor: actor.clone(),
            matter,
            capability,
        })
    }

    pub(crate) async fn require_matter(&self, id: MatterId) -> Result<Matter, CoordinationError> {
        self.store
            .load_matter(id)
            .await?
            .ok_or_else(|| CoordinationError::not_found(EntityKind::Matter, id))
    }

    /// Loads a matter that may still be mutated.
    pub(crate) async fn require_open_matter(
        &self,
        id: MatterId,
    ) -> Result<Matter, CoordinationError> {
        let matter = self.require_matter(id).await?;
        matter.ensure_open()?;
        Ok(matter)
    }

    /// The pipeline a matter is on. A matter pointing at an unknown pipeline
    /// means the catalog and the data disagree.
    pub(crate) async fn pipeline_of(&self, matter: &Matter) -> Result<Pipeline, CoordinationError> {
        self.catalog
            .pipeline(&matter.pipeline_id)
            .await?
            .ok_or_else(|| {
                CoordinationError::configuration(format!(
                    "matter {} references unknown pipeline '{}'",
                    matter.id, matter.pipeline_id
                ))
            })
    }
}
