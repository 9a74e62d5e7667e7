//! Read-through cache over a [`PipelineCatalog`].
//!
//! Catalog data is immutable at runtime, so entries never expire. Only hits
//! are cached; a missing pipeline is looked up again next time.

use std::sync::Arc;

use async_trait::async_trait;
use coordination::{CoordinationError, Pipeline, PipelineCatalog, PipelineId, StageId, TaskTemplate};
use moka::future::Cache;

/// Caches pipelines by id and template lists by stage id.
#[derive(Clone)]
pub struct CachedCatalog {
    inner: Arc<dyn PipelineCatalog>,
    pipelines: Cache<PipelineId, Pipeline>,
    templates: Cache<StageId, Arc<Vec<TaskTemplate>>>,
}

impl CachedCatalog {
    pub fn new(inner: Arc<dyn PipelineCatalog>, capacity: u64) -> Self {
        Self {
            inner,
            pipelines: Cache::new(capacity),
            templates: Cache::new(capacity),
        }
    }

    /// Drops every cached entry, e.g. after the catalog was re-seeded.
    pub fn invalidate_all(&self) {
        self.pipelines.invalidate_all();
        self.templates.invalidate_all();
    }
}

#[async_trait]
impl PipelineCatalog for CachedCatalog {
    async fn pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>, CoordinationError> {
        if let Some(hit) = self.pipelines.get(id).await {
            return Ok(Some(hit));
        }
        let loaded = self.inner.pipeline(id).await?;
        if let Some(pipeline) = &loaded {
            self.pipelines.insert(id.clone(), pipeline.clone()).await;
            tracing::debug!(pipeline_id = %id, "cached pipeline");
        }
        Ok(loaded)
    }

    async fn templates_for_stage(
        &self,
        stage: &StageId,
    ) -> Result<Vec<TaskTemplate>, CoordinationError> {
        if let Some(hit) = self.templates.get(stage).await {
            return Ok(hit.as_ref().clone());
        }
        let loaded = self.inner.templates_for_stage(stage).await?;
        self.templates
            .insert(stage.clone(), Arc::new(loaded.clone()))
            .await;
        Ok(loaded)
    }
}
