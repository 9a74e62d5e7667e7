//! Pipeline catalog configuration: stages and task templates.
//!
//! These records are owned by configuration, never by the engine. They are
//! immutable at runtime and referenced by id from matters and tasks.

use serde::{Deserialize, Serialize};

use crate::{CoordinationError, PipelineId, StageId, TaskPriority, TemplateId};

/// One phase of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Position within the pipeline, starting at 0.
    pub ordinal: u32,
    /// Presentation hint (e.g. a colour or icon key); opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<String>,
}

/// An ordered sequence of stages.
///
/// Construct through [`Pipeline::new`], which enforces that ordinals are
/// unique and contiguous from 0 and keeps `stages` sorted by ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    id: PipelineId,
    name: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Validates and builds a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Configuration`] when the pipeline is empty,
    /// when ordinals are duplicated or leave a gap, or when a stage id repeats.
    pub fn new(
        id: PipelineId,
        name: impl Into<String>,
        mut stages: Vec<Stage>,
    ) -> Result<Self, CoordinationError> {
        if stages.is_empty() {
            return Err(CoordinationError::configuration(format!(
                "pipeline '{id}' has no stages"
            )));
        }
        stages.sort_by_key(|s| s.ordinal);
        for (expected, stage) in stages.iter().enumerate() {
            if stage.ordinal as usize != expected {
                return Err(CoordinationError::configuration(format!(
                    "pipeline '{id}': stage '{}' has ordinal {}, expected {expected}",
                    stage.id, stage.ordinal
                )));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for stage in &stages {
            if !seen.insert(&stage.id) {
                return Err(CoordinationError::configuration(format!(
                    "pipeline '{id}': duplicate stage id '{}'",
                    stage.id
                )));
            }
        }
        Ok(Self {
            id,
            name: name.into(),
            stages,
        })
    }

    pub fn id(&self) -> &PipelineId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages sorted by ordinal.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Looks up a stage of this pipeline by id.
    pub fn stage(&self, id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| &s.id == id)
    }

    /// Returns `true` when `id` names a stage of this pipeline.
    pub fn contains(&self, id: &StageId) -> bool {
        self.stage(id).is_some()
    }

    /// The stage after `id`, if any.
    pub fn next_after(&self, id: &StageId) -> Option<&Stage> {
        let current = self.stage(id)?;
        self.stages.get(current.ordinal as usize + 1)
    }
}

/// A reusable definition of a task bound to one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: TemplateId,
    pub stage_id: StageId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub client_visible: bool,
    #[serde(default)]
    pub required: bool,
    /// Days after materialization the task falls due; `None` leaves it undated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_in_days: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(id: &str, ordinal: u32) -> Stage {
        Stage {
            id: StageId::new(id).unwrap(),
            name: id.to_string(),
            description: String::new(),
            ordinal,
            visual: None,
        }
    }

    #[test]
    fn stages_are_sorted_by_ordinal() {
        let pipeline = Pipeline::new(
            PipelineId::new("p").unwrap(),
            "P",
            vec![stage("filing", 2), stage("intake", 0), stage("review", 1)],
        )
        .unwrap();
        let ids: Vec<&str> = pipeline.stages().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["intake", "review", "filing"]);
        assert_eq!(
            pipeline
                .next_after(&StageId::new("intake").unwrap())
                .map(|s| s.id.as_str()),
            Some("review")
        );
        assert!(pipeline.next_after(&StageId::new("filing").unwrap()).is_none());
    }

    #[test]
    fn gaps_and_duplicates_are_rejected() {
        let id = PipelineId::new("p").unwrap();
        assert!(Pipeline::new(id.clone(), "P", vec![stage("a", 0), stage("b", 2)]).is_err());
        assert!(Pipeline::new(id.clone(), "P", vec![stage("a", 0), stage("b", 0)]).is_err());
        assert!(Pipeline::new(id.clone(), "P", vec![stage("a", 0), stage("a", 1)]).is_err());
        assert!(Pipeline::new(id.clone(), "P", vec![stage("a", 1)]).is_err());
        assert!(Pipeline::new(id, "P", vec![]).is_err());
    }
}
