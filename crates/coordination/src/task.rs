//! Tasks and the template materialization rules.
//!
//! [`plan_materialization`] decides which templates still need a concrete task
//! for a (matter, stage) pair. The explicit [`TaskOrigin::Template`] tag is the
//! authoritative de-duplication key; title matching is an opt-in legacy mode
//! layered on top of it.

use std::collections::HashSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
    CoordinationError, MatterId, StageId, TaskId, TaskPriority, TaskStatus, TaskTemplate,
    TemplateId, Timestamp, UserId,
};

const TEMPLATE_ORIGIN_PREFIX: &str = "materialized-from-template:";
const MANUAL_ORIGIN: &str = "manual";

/// Where a task came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    /// Created by staff.
    Manual,
    /// Materialized from the given template.
    Template(TemplateId),
}

impl TaskOrigin {
    /// Stable textual tag: `manual` or `materialized-from-template:<id>`.
    pub fn as_tag(&self) -> String {
        match self {
            Self::Manual => MANUAL_ORIGIN.to_string(),
            Self::Template(id) => format!("{TEMPLATE_ORIGIN_PREFIX}{id}"),
        }
    }

    /// Parses a tag produced by [`TaskOrigin::as_tag`].
    pub fn parse(tag: &str) -> Option<Self> {
        if tag == MANUAL_ORIGIN {
            return Some(Self::Manual);
        }
        tag.strip_prefix(TEMPLATE_ORIGIN_PREFIX)
            .and_then(TemplateId::new)
            .map(Self::Template)
    }

    /// The template id, for materialized tasks.
    pub fn template_id(&self) -> Option<&TemplateId> {
        match self {
            Self::Manual => None,
            Self::Template(id) => Some(id),
        }
    }
}

/// A unit of stage-scoped (or matter-wide) work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub matter_id: MatterId,
    /// `None` for matter-wide tasks.
    pub stage_id: Option<StageId>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_at: Option<Timestamp>,
    pub client_visible: bool,
    pub required: bool,
    pub assignee: Option<UserId>,
    pub origin: TaskOrigin,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Task {
    /// Builds the concrete task for `template` on `matter_id`.
    pub fn from_template(matter_id: MatterId, template: &TaskTemplate, now: Timestamp) -> Self {
        Self {
            id: TaskId::new_random(),
            matter_id,
            stage_id: Some(template.stage_id.clone()),
            title: template.title.clone(),
            description: template.description.clone(),
            status: TaskStatus::Pending,
            priority: template.priority,
            due_at: template
                .due_in_days
                .and_then(|days| Duration::try_days(i64::from(days)))
                .and_then(|delay| now.checked_plus(delay)),
            client_visible: template.client_visible,
            required: template.required,
            assignee: None,
            origin: TaskOrigin::Template(template.id.clone()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Staff-supplied fields for a manually created task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub stage_id: Option<StageId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_at: Option<Timestamp>,
    #[serde(default)]
    pub client_visible: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub assignee: Option<UserId>,
}

impl NewTask {
    /// Validates the input and builds a `manual` task.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Validation`] for a blank title.
    pub fn into_task(self, matter_id: MatterId, now: Timestamp) -> Result<Task, CoordinationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(CoordinationError::validation("task title must not be empty"));
        }
        Ok(Task {
            id: TaskId::new_random(),
            matter_id,
            stage_id: self.stage_id,
            title,
            description: self.description,
            status: TaskStatus::Pending,
            priority: self.priority,
            due_at: self.due_at,
            client_visible: self.client_visible,
            required: self.required,
            assignee: self.assignee,
            origin: TaskOrigin::Manual,
            created_at: now,
            updated_at: now,
        })
    }
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

/// How existing tasks are matched against templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    /// Match only on the template-id origin tag.
    #[default]
    TemplateId,
    /// Additionally treat an existing task with an equal title as covering the
    /// template. Never used on its own.
    TemplateIdOrTitle,
}

/// Returns the tasks to create on `matter_id` for `stage_id`.
///
/// `existing` is every task currently stored for the pair; tasks on other
/// stages are ignored. Templates bound to a different stage are skipped.
/// The result preserves template order.
pub fn plan_materialization(
    matter_id: MatterId,
    stage_id: &StageId,
    templates: &[TaskTemplate],
    existing: &[Task],
    mode: DedupMode,
    now: Timestamp,
) -> Vec<Task> {
    let on_stage = existing
        .iter()
        .filter(|t| t.matter_id == matter_id && t.stage_id.as_ref() == Some(stage_id));

    let mut covered: HashSet<&TemplateId> = HashSet::new();
    let mut titles: HashSet<&str> = HashSet::new();
    for task in on_stage {
        if let Some(id) = task.origin.template_id() {
            covered.insert(id);
        }
        titles.insert(task.title.as_str());
    }

    let planned: Vec<Task> = templates
        .iter()
        .filter(|tpl| &tpl.stage_id == stage_id)
        .filter(|tpl| !covered.contains(&tpl.id))
        .filter(|tpl| match mode {
            DedupMode::TemplateId => true,
            DedupMode::TemplateIdOrTitle => !titles.contains(tpl.title.as_str()),
        })
        .map(|tpl| Task::from_template(matter_id, tpl, now))
        .collect();

    tracing::debug!(
        matter_id = %matter_id,
        stage_id = %stage_id,
        templates = templates.len(),
        already_covered = covered.len(),
        planned = planned.len(),
        "materialization planned"
    );
    planned
}
