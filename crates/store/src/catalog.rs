//! Pipeline and template tables.

use coordination::{
    CoordinationError, Pipeline, PipelineId, Stage, StageId, TaskPriority, TaskTemplate,
    TemplateId,
};
use rusqlite::{params, Connection, OptionalExtension};

use crate::StoreError;

/// Replaces the whole catalog with `pipelines` and `templates`.
///
/// Templates must reference a stage of one of the given pipelines, and no
/// stage id may appear in two pipelines.
pub(crate) fn seed(
    conn: &mut Connection,
    pipelines: &[Pipeline],
    templates: &[TaskTemplate],
) -> Result<(), CoordinationError> {
    for (index, pipeline) in pipelines.iter().enumerate() {
        for other in &pipelines[index + 1..] {
            if let Some(shared) = pipeline.stages().iter().find(|s| other.contains(&s.id)) {
                return Err(CoordinationError::configuration(format!(
                    "stage '{}' is defined by both pipeline '{}' and pipeline '{}'",
                    shared.id,
                    pipeline.id(),
                    other.id()
                )));
            }
        }
    }
    if let Some(orphan) = templates
        .iter()
        .find(|tpl| !pipelines.iter().any(|p| p.contains(&tpl.stage_id)))
    {
        return Err(CoordinationError::configuration(format!(
            "template '{}' references unknown stage '{}'",
            orphan.id, orphan.stage_id
        )));
    }

    let tx = conn.transaction().map_err(StoreError::from)?;
    tx.execute_batch("DELETE FROM task_templates; DELETE FROM stages; DELETE FROM pipelines;")
        .map_err(StoreError::from)?;

    for pipeline in pipelines {
        tx.execute(
            "INSERT INTO pipelines (id, name) VALUES (?1, ?2)",
            params![pipeline.id().as_str(), pipeline.name()],
        )
        .map_err(StoreError::from)?;
        for stage in pipeline.stages() {
            tx.execute(
                "INSERT INTO stages (pipeline_id, id, name, description, ordinal, visual) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pipeline.id().as_str(),
                    stage.id.as_str(),
                    stage.name,
                    stage.description,
                    stage.ordinal,
                    stage.visual,
                ],
            )
            .map_err(StoreError::from)?;
        }
    }

    for (position, tpl) in templates.iter().enumerate() {
        tx.execute(
            "INSERT INTO task_templates (id, stage_id, title, description, priority, \
             client_visible, required, due_in_days, position) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                tpl.id.as_str(),
                tpl.stage_id.as_str(),
                tpl.title,
                tpl.description,
                tpl.priority.as_str(),
                tpl.client_visible,
                tpl.required,
                tpl.due_in_days,
                position as i64,
            ],
        )
        .map_err(|err| {
            let err = StoreError::from(err);
            if err.is_primary_key_violation() {
                CoordinationError::configuration(format!("duplicate template id '{}'", tpl.id))
            } else {
                err.into()
            }
        })?;
    }

    tx.commit().map_err(StoreError::from)?;
    tracing::info!(
        pipelines = pipelines.len(),
        templates = templates.len(),
        "catalog seeded"
    );
    Ok(())
}

/// Loads and re-validates one pipeline.
pub(crate) fn load_pipeline(
    conn: &Connection,
    id: &PipelineId,
) -> Result<Option<Pipeline>, CoordinationError> {
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM pipelines WHERE id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(StoreError::from)?;
    let Some(name) = name else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare(
            "SELECT id, name, description, ordinal, visual FROM stages \
             WHERE pipeline_id = ?1 ORDER BY ordinal",
        )
        .map_err(StoreError::from)?;
    let rows = stmt
        .query_map(params![id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })
        .map_err(StoreError::from)?;

    let mut stages = Vec::new();
    for row in rows {
        let (stage_id, name, description, ordinal, visual) = row.map_err(StoreError::from)?;
        let id = StageId::new(stage_id).ok_or_else(|| StoreError::Corrupt {
            table: "stages",
            reason: "blank stage id".into(),
        })?;
        stages.push(Stage {
            id,
            name,
            description,
            ordinal,
            visual,
        });
    }
    Pipeline::new(id.clone(), name, stages).map(Some)
}

/// Templates bound to `stage`, in seeding order.
pub(crate) fn load_templates(
    conn: &Connection,
    stage: &StageId,
) -> Result<Vec<TaskTemplate>, CoordinationError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, title, description, priority, client_visible, required, due_in_days \
             FROM task_templates WHERE stage_id = ?1 ORDER BY position",
        )
        .map_err(StoreError::from)?;
    let rows = stmt
        .query_map(params![stage.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, bool>(5)?,
                row.get::<_, Option<u32>>(6)?,
            ))
        })
        .map_err(StoreError::from)?;

    let mut templates = Vec::new();
    for row in rows {
        let (id, title, description, priority, client_visible, required, due_in_days) =
            row.map_err(StoreError::from)?;
        let corrupt = |reason: String| StoreError::Corrupt {
            table: "task_templates",
            reason,
        };
        templates.push(TaskTemplate {
            id: TemplateId::new(id).ok_or_else(|| corrupt("blank template id".into()))?,
            stage_id: stage.clone(),
            title,
            description,
            priority: TaskPriority::parse(&priority)
                .ok_or_else(|| corrupt(format!("unknown priority '{priority}'")))?,
            client_visible,
            required,
            due_in_days,
        });
    }
    Ok(templates)
}
