#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coordination::{
    Authorizer, Capability, CoordinationError, FirmId, HistoryEvent, Matter, MatterId,
    NotificationHook, Pipeline, PipelineId, Stage, StageId, TaskPriority, TaskTemplate,
    TemplateId, Timestamp, UserId,
};
use engine::{CoordinationEngine, EngineSettings, RetrySettings};
use store::SqliteStore;
use tokio::sync::mpsc;

pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn can_act(&self, _: &UserId, _: MatterId, _: Capability) -> Result<bool, CoordinationError> {
        Ok(true)
    }
}

/// Refuses one capability, allows the rest.
pub struct Refuse(pub Capability);

#[async_trait]
impl Authorizer for Refuse {
    async fn can_act(
        &self,
        _: &UserId,
        _: MatterId,
        capability: Capability,
    ) -> Result<bool, CoordinationError> {
        Ok(capability != self.0)
    }
}

pub struct RecordingHook(pub mpsc::UnboundedSender<HistoryEvent>);

#[async_trait]
impl NotificationHook for RecordingHook {
    async fn notify(&self, event: &HistoryEvent) -> Result<(), CoordinationError> {
        let _ = self.0.send(event.clone());
        Ok(())
    }
}

pub struct FailingHook;

#[async_trait]
impl NotificationHook for FailingHook {
    async fn notify(&self, _: &HistoryEvent) -> Result<(), CoordinationError> {
        Err(CoordinationError::Platform {
            message: "notification endpoint unavailable".into(),
        })
    }
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn stage_id(id: &str) -> StageId {
    StageId::new(id).unwrap()
}

pub fn at(s: &str) -> Timestamp {
    Timestamp::parse_rfc3339(s).unwrap()
}

fn stage(id: &str, name: &str, ordinal: u32) -> Stage {
    Stage {
        id: stage_id(id),
        name: name.into(),
        description: String::new(),
        ordinal,
        visual: Some(format!("icon-{id}")),
    }
}

fn template(id: &str, stage: &str, title: &str, required: bool) -> TaskTemplate {
    TaskTemplate {
        id: TemplateId::new(id).unwrap(),
        stage_id: stage_id(stage),
        title: title.into(),
        description: String::new(),
        priority: TaskPriority::High,
        client_visible: false,
        required,
        due_in_days: Some(5),
    }
}

/// Stages `intake(0)`, `review(1)`, `filing(2)`; two templates on intake,
/// one on review, none on filing.
pub fn catalog() -> (Vec<Pipeline>, Vec<TaskTemplate>) {
    let pipeline = Pipeline::new(
        PipelineId::new("litigation").unwrap(),
        "Litigation",
        vec![
            stage("intake", "Intake", 0),
            stage("review", "Review", 1),
            stage("filing", "Filing", 2),
        ],
    )
    .unwrap();
    let templates = vec![
        template("collect-id", "intake", "Collect client ID", true),
        template("engagement", "intake", "Send engagement letter", false),
        template("conflict-check", "review", "Run conflict check", true),
    ];
    (vec![pipeline], templates)
}

pub struct Harness {
    pub engine: Arc<CoordinationEngine>,
    pub store: Arc<SqliteStore>,
    pub matter: MatterId,
    pub notifications: mpsc::UnboundedReceiver<HistoryEvent>,
}

pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        retry: RetrySettings {
            max_attempts: 10,
            base_backoff: Duration::from_millis(1),
        },
        ..EngineSettings::default()
    }
}

pub async fn harness_with(authorizer: Arc<dyn Authorizer>, settings: EngineSettings) -> Harness {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let (pipelines, templates) = catalog();
    store.seed_catalog(&pipelines, &templates).await.unwrap();

    let matter = Matter::from_intake(
        FirmId::new("firm-1").unwrap(),
        PipelineId::new("litigation").unwrap(),
        Timestamp::now(),
    );
    store.insert_matter(&matter).await.unwrap();

    let (tx, notifications) = mpsc::unbounded_channel();
    let engine = CoordinationEngine::new(
        store.clone(),
        store.clone(),
        authorizer,
        Arc::new(RecordingHook(tx)),
        settings,
    );
    Harness {
        engine: Arc::new(engine),
        store,
        matter: matter.id,
        notifications,
    }
}

pub async fn harness() -> Harness {
    harness_with(Arc::new(AllowAll), fast_settings()).await
}
