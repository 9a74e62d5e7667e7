//! Task materialization from stage templates, manual tasks and task updates.

use coordination::{
    plan_materialization, Capability, CoordinationError, EntityKind, HistoryPayload,
    MaterializedTask, Matter, MatterId, Mutation, NewTask, Pipeline, PipelineCatalog, StageId,
    Task, TaskId, TaskStatus, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

use crate::CoordinationEngine;

/// Required tasks of a stage that are not yet completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReadiness {
    pub stage_id: StageId,
    pub required: usize,
    pub outstanding: Vec<Task>,
}

impl StageReadiness {
    pub fn is_ready(&self) -> bool {
        self.outstanding.is_empty()
    }
}

fn require_stage(pipeline: &Pipeline, stage: &StageId) -> Result<(), CoordinationError> {
    if pipeline.contains(stage) {
        Ok(())
    } else {
        Err(CoordinationError::InvalidStageForPipeline {
            stage: stage.clone(),
            pipeline: pipeline.id().clone(),
        })
    }
}

impl CoordinationEngine {
    /// Creates a task for every template of `stage` not yet materialized on
    /// the matter and returns the new tasks.
    ///
    /// Always records one `tasks_materialized` event, listing the created
    /// tasks (possibly none). A concurrent duplicate call loses with
    /// `Conflict`; retried, it creates nothing.
    #[tracing::instrument(skip_all, fields(matter_id = %matter, stage_id = %stage, actor = %actor))]
    pub async fn materialize_for_stage(
        &self,
        matter: MatterId,
        stage: &StageId,
        actor: &UserId,
    ) -> Result<Vec<Task>, CoordinationError> {
        self.authorize(actor, matter, Capability::MaterializeTasks).await?;
        let current = self.require_open_matter(matter).await?;
        let pipeline = self.pipeline_of(&current).await?;
        require_stage(&pipeline, stage)?;

        let templates = self.catalog.templates_for_stage(stage).await?;
        let existing = self.store.load_tasks(matter, Some(stage)).await?;
        let now = Timestamp::now();
        let created = plan_materialization(
            matter,
            stage,
            &templates,
            &existing,
            self.settings.dedup_mode,
            now,
        );

        let summary = created
            .iter()
            .filter_map(|task| {
                task.origin.template_id().map(|template_id| MaterializedTask {
                    task_id: task.id,
                    template_id: template_id.clone(),
                    title: task.title.clone(),
                })
            })
            .collect();
        let mutations = if created.is_empty() {
            Vec::new()
        } else {
            vec![Mutation::InsertTasks(created.clone())]
        };
        self.record(
            &current,
            actor,
            mutations,
            HistoryPayload::TasksMaterialized {
                stage_id: stage.clone(),
                tasks: summary,
            },
            now,
        )
        .await?;
        tracing::info!(created = created.len(), "tasks materialized");
        Ok(created)
    }

    /// Creates a `manual` task. A given stage must belong to the matter's pipeline.
    #[tracing::instrument(skip_all, fields(matter_id = %matter, actor = %actor))]
    pub async fn create_task(
        &self,
        matter: MatterId,
        input: NewTask,
        actor: &UserId,
    ) -> Result<Task, CoordinationError> {
        self.authorize(actor, matter, Capability::ManageTasks).await?;
        let current = self.require_open_matter(matter).await?;
        if let Some(stage) = &input.stage_id {
            let pipeline = self.pipeline_of(&current).await?;
            require_stage(&pipeline, stage)?;
        }

        let now = Timestamp::now();
        let task = input.into_task(matter, now)?;
        self.record(
            &current,
            actor,
            vec![Mutation::InsertTasks(vec![task.clone()])],
            HistoryPayload::TaskCreated {
                task_id: task.id,
                stage_id: task.stage_id.clone(),
                title: task.title.clone(),
            },
            now,
        )
        .await?;
        Ok(task)
    }

    /// Sets a task's status.
    ///
    /// # Errors
    ///
    /// `Validation` when the task already has `status`.
    #[tracing::instrument(skip_all, fields(task_id = %task, status = %status, actor = %actor))]
    pub async fn update_task_status(
        &self,
        task: TaskId,
        status: TaskStatus,
        actor: &UserId,
    ) -> Result<Task, CoordinationError> {
        let (current, existing) = self.task_for_update(task, actor).await?;
        if existing.status == status {
            return Err(CoordinationError::validation(format!(
                "task {task} is already {status}"
            )));
        }
        let now = Timestamp::now();
        let mut next = existing.clone();
        next.status = status;
        next.updated_at = now;
        self.record(
            &current,
            actor,
            vec![Mutation::UpdateTask(next.clone())],
            HistoryPayload::TaskStatusChanged {
                task_id: task,
                from: existing.status,
                to: status,
            },
            now,
        )
        .await?;
        Ok(next)
    }

    /// Shows or hides a task from the client.
    #[tracing::instrument(skip_all, fields(task_id = %task, client_visible = client_visible, actor = %actor))]
    pub async fn set_task_visibility(
        &self,
        task: TaskId,
        client_visible: bool,
        actor: &UserId,
    ) -> Result<Task, CoordinationError> {
        let (current, existing) = self.task_for_update(task, actor).await?;
        if existing.client_visible == client_visible {
            return Err(CoordinationError::validation(format!(
                "task {task} visibility is already {client_visible}"
            )));
        }
        let now = Timestamp::now();
        let mut next = existing;
        next.client_visible = client_visible;
        next.updated_at = now;
        self.record(
            &current,
            actor,
            vec![Mutation::UpdateTask(next.clone())],
            HistoryPayload::TaskVisibilityChanged {
                task_id: task,
                client_visible,
            },
            now,
        )
        .await?;
        Ok(next)
    }

    /// Reports the required tasks of `stage` that are not completed.
    #[tracing::instrument(skip_all, fields(matter_id = %matter, stage_id = %stage))]
    pub async fn stage_readiness(
        &self,
        matter: MatterId,
        stage: &StageId,
    ) -> Result<StageReadiness, CoordinationError> {
        let current = self.require_matter(matter).await?;
        let pipeline = self.pipeline_of(&current).await?;
        require_stage(&pipeline, stage)?;

        let required: Vec<Task> = self
            .store
            .load_tasks(matter, Some(stage))
            .await?
            .into_iter()
            .filter(|task| task.required)
            .collect();
        let total = required.len();
        let outstanding = required
            .into_iter()
            .filter(|task| task.status != TaskStatus::Completed)
            .collect();
        Ok(StageReadiness {
            stage_id: stage.clone(),
            required: total,
            outstanding,
        })
    }

    /// Loads the task and its open matter. The task is read again after the
    /// matter so its state is no older than the version the commit checks.
    async fn task_for_update(
        &self,
        task: TaskId,
        actor: &UserId,
    ) -> Result<(Matter, Task), CoordinationError> {
        let owner = self.require_task(task).await?.matter_id;
        self.authorize(actor, owner, Capability::ManageTasks).await?;
        let current = self.require_open_matter(owner).await?;
        let existing = self.require_task(task).await?;
        Ok((current, existing))
    }

    async fn require_task(&self, task: TaskId) -> Result<Task, CoordinationError> {
        self.store
            .load_task(task)
            .await?
            .ok_or_else(|| CoordinationError::not_found(EntityKind::Task, task))
    }
}
