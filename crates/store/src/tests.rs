use std::time::Duration;

use coordination::{
    AssignmentRole, CoordinationError, CoordinationStore, FirmId, HistoryPayload, LifecycleState,
    MaterializedTask, Matter, MatterCommit, Mutation, NewHistoryEvent, Pipeline, PipelineCatalog,
    PipelineId, Stage, StageId, Task, TaskPriority, TaskTemplate, TemplateId, Timestamp, UserId,
};

use super::*;

fn stage(id: &str, ordinal: u32) -> Stage {
    Stage {
        id: StageId::new(id).unwrap(),
        name: id.to_uppercase(),
        description: String::new(),
        ordinal,
        visual: None,
    }
}

fn pipeline() -> Pipeline {
    Pipeline::new(
        PipelineId::new("litigation").unwrap(),
        "Litigation",
        vec![stage("intake", 0), stage("discovery", 1), stage("trial", 2)],
    )
    .unwrap()
}

fn template(id: &str, stage_id: &str) -> TaskTemplate {
    TaskTemplate {
        id: TemplateId::new(id).unwrap(),
        stage_id: StageId::new(stage_id).unwrap(),
        title: format!("Task {id}"),
        description: String::new(),
        priority: TaskPriority::Medium,
        client_visible: false,
        required: true,
        due_in_days: Some(7),
    }
}

fn at(s: &str) -> Timestamp {
    Timestamp::parse_rfc3339(s).unwrap()
}

fn actor() -> UserId {
    UserId::new("cm-1").unwrap()
}

async fn store_with_matter() -> (SqliteStore, Matter) {
    let store = SqliteStore::in_memory().unwrap();
    store
        .seed_catalog(&[pipeline()], &[template("t1", "intake"), template("t2", "intake")])
        .await
        .unwrap();
    let matter = Matter::from_intake(
        FirmId::new("firm-1").unwrap(),
        PipelineId::new("litigation").unwrap(),
        at("2026-01-05T09:00:00Z"),
    );
    store.insert_matter(&matter).await.unwrap();
    (store, matter)
}

fn closing_commit(matter: &Matter, expected_version: i64, when: &str) -> MatterCommit {
    let mut closed = matter.clone();
    closed.lifecycle = LifecycleState::Closed;
    closed.updated_at = at(when);
    MatterCommit {
        matter_id: matter.id,
        expected_version,
        mutations: vec![Mutation::UpdateMatter(closed)],
        event: NewHistoryEvent::new(
            matter.id,
            actor(),
            HistoryPayload::MatterClosed {
                previous: matter.lifecycle,
            },
            at(when),
        ),
    }
}

fn materialize_commit(matter: &Matter, expected_version: i64, tasks: Vec<Task>) -> MatterCommit {
    let summary = tasks
        .iter()
        .map(|t| MaterializedTask {
            task_id: t.id,
            template_id: t.origin.template_id().cloned().unwrap(),
            title: t.title.clone(),
        })
        .collect();
    MatterCommit {
        matter_id: matter.id,
        expected_version,
        mutations: vec![Mutation::InsertTasks(tasks)],
        event: NewHistoryEvent::new(
            matter.id,
            actor(),
            HistoryPayload::TasksMaterialized {
                stage_id: StageId::new("intake").unwrap(),
                tasks: summary,
            },
            at("2026-01-06T09:00:00Z"),
        ),
    }
}

#[tokio::test]
async fn matters_round_trip_through_the_store() {
    let (store, matter) = store_with_matter().await;
    let loaded = store.load_matter(matter.id).await.unwrap().unwrap();
    assert_eq!(loaded, matter);
    assert_eq!(store.schema_version().await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn inserting_the_same_matter_twice_is_rejected() {
    let (store, matter) = store_with_matter().await;
    let err = store.insert_matter(&matter).await.unwrap_err();
    assert!(matches!(err, CoordinationError::Validation { .. }), "{err:?}");
}

#[tokio::test]
async fn commit_bumps_the_version_and_appends_history() {
    let (store, matter) = store_with_matter().await;
    let receipt = store
        .commit(closing_commit(&matter, 0, "2026-01-06T10:00:00Z"))
        .await
        .unwrap();
    assert_eq!(receipt.version, 1);

    let loaded = store.load_matter(matter.id).await.unwrap().unwrap();
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.lifecycle, LifecycleState::Closed);

    let timeline = store.timeline(matter.id).await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0], receipt.event);
}

#[tokio::test]
async fn stale_versions_conflict_without_writing() {
    let (store, matter) = store_with_matter().await;
    store
        .commit(closing_commit(&matter, 0, "2026-01-06T10:00:00Z"))
        .await
        .unwrap();

    let err = store
        .commit(closing_commit(&matter, 0, "2026-01-06T11:00:00Z"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CoordinationError::Conflict {
            matter: matter.id,
            expected: 0,
            actual: 1,
        }
    );
    assert!(err.retry_policy().is_retryable());
    assert_eq!(store.timeline(matter.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn committing_against_an_unknown_matter_is_not_found() {
    let (store, matter) = store_with_matter().await;
    let mut other = matter.clone();
    other.id = coordination::MatterId::new_random();
    let err = store
        .commit(closing_commit(&other, 0, "2026-01-06T10:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::NotFound { .. }), "{err:?}");
}

#[tokio::test]
async fn duplicate_template_tasks_abort_the_whole_commit() {
    let (store, matter) = store_with_matter().await;
    let now = at("2026-01-06T09:00:00Z");
    let tpl = template("t1", "intake");

    store
        .commit(materialize_commit(
            &matter,
            0,
            vec![Task::from_template(matter.id, &tpl, now)],
        ))
        .await
        .unwrap();

    let duplicate = Task::from_template(matter.id, &tpl, now);
    let fresh = Task::from_template(matter.id, &template("t2", "intake"), now);
    let err = store
        .commit(materialize_commit(&matter, 1, vec![fresh, duplicate]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::Conflict { .. }), "{err:?}");

    let matter_after = store.load_matter(matter.id).await.unwrap().unwrap();
    assert_eq!(matter_after.version, 1);
    let stage = StageId::new("intake").unwrap();
    assert_eq!(store.load_tasks(matter.id, Some(&stage)).await.unwrap().len(), 1);
    assert_eq!(store.timeline(matter.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn timeline_is_newest_first_with_sequence_breaking_ties() {
    let (store, matter) = store_with_matter().await;
    let same_instant = at("2026-01-06T09:00:00Z");
    let mut version = 0;
    for role in [AssignmentRole::Associate, AssignmentRole::CaseManager] {
        let receipt = store
            .commit(MatterCommit {
                matter_id: matter.id,
                expected_version: version,
                mutations: vec![],
                event: NewHistoryEvent::new(
                    matter.id,
                    actor(),
                    HistoryPayload::CaseAssigned {
                        role,
                        previous: None,
                        assignee: None,
                        unchanged: true,
                    },
                    same_instant,
                ),
            })
            .await
            .unwrap();
        version = receipt.version;
    }
    store
        .commit(closing_commit(&matter, version, "2026-01-05T08:00:00Z"))
        .await
        .unwrap();

    let timeline = store.timeline(matter.id).await.unwrap();
    assert_eq!(timeline.len(), 3);
    assert!(timeline[0].sequence > timeline[1].sequence);
    assert!(matches!(
        timeline[0].payload,
        HistoryPayload::CaseAssigned {
            role: AssignmentRole::CaseManager,
            ..
        }
    ));
    assert!(matches!(timeline[2].payload, HistoryPayload::MatterClosed { .. }));
}

#[tokio::test]
async fn reassignment_supersedes_the_current_row() {
    let (store, matter) = store_with_matter().await;
    let assign = |user: Option<&str>, version: i64, when: &str| MatterCommit {
        matter_id: matter.id,
        expected_version: version,
        mutations: vec![Mutation::Assign {
            role: AssignmentRole::Associate,
            user: user.and_then(UserId::new),
            assigned_by: actor(),
            at: at(when),
        }],
        event: NewHistoryEvent::new(
            matter.id,
            actor(),
            HistoryPayload::CaseAssigned {
                role: AssignmentRole::Associate,
                previous: None,
                assignee: user.and_then(UserId::new),
                unchanged: false,
            },
            at(when),
        ),
    };

    store.commit(assign(Some("assoc-1"), 0, "2026-01-06T09:00:00Z")).await.unwrap();
    store.commit(assign(Some("assoc-2"), 1, "2026-01-07T09:00:00Z")).await.unwrap();

    let current = store
        .current_assignment(matter.id, AssignmentRole::Associate)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.user_id.as_str(), "assoc-2");

    let history = store
        .assignment_history(matter.id, AssignmentRole::Associate)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].superseded_at, Some(at("2026-01-07T09:00:00Z")));
    assert!(history[1].is_current());

    store.commit(assign(None, 2, "2026-01-08T09:00:00Z")).await.unwrap();
    assert!(store
        .current_assignment(matter.id, AssignmentRole::Associate)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        store
            .assignment_history(matter.id, AssignmentRole::Associate)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn catalog_round_trips_in_seeding_order() {
    let (store, _) = store_with_matter().await;
    let loaded = store
        .pipeline(&PipelineId::new("litigation").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, pipeline());

    let templates = store
        .templates_for_stage(&StageId::new("intake").unwrap())
        .await
        .unwrap();
    let ids: Vec<&str> = templates.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["t1", "t2"]);
    assert!(store
        .pipeline(&PipelineId::new("probate").unwrap())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn templates_for_unknown_stages_are_rejected_at_seed_time() {
    let store = SqliteStore::in_memory().unwrap();
    let err = store
        .seed_catalog(&[pipeline()], &[template("t9", "appeal")])
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::Configuration { .. }), "{err:?}");
}

#[tokio::test]
async fn stage_ids_shared_between_pipelines_are_rejected_at_seed_time() {
    let (store, _) = store_with_matter().await;
    let probate = Pipeline::new(
        PipelineId::new("probate").unwrap(),
        "Probate",
        vec![stage("intake", 0), stage("hearing", 1)],
    )
    .unwrap();

    let err = store
        .seed_catalog(&[pipeline(), probate], &[template("t1", "intake")])
        .await
        .unwrap_err();
    assert!(
        matches!(&err, CoordinationError::Configuration { message } if message.contains("'intake'")),
        "{err:?}"
    );

    // The previous catalog is untouched.
    let templates = store
        .templates_for_stage(&StageId::new("intake").unwrap())
        .await
        .unwrap();
    assert_eq!(templates.len(), 2);
    assert!(store
        .pipeline(&PipelineId::new("probate").unwrap())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn reseeding_replaces_the_catalog() {
    let (store, _) = store_with_matter().await;
    store
        .seed_catalog(&[pipeline()], &[template("t3", "discovery")])
        .await
        .unwrap();
    let intake = store
        .templates_for_stage(&StageId::new("intake").unwrap())
        .await
        .unwrap();
    assert!(intake.is_empty());
}

#[tokio::test]
async fn file_databases_keep_their_schema_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("matterflow.db");
    let matter_id = {
        let store = SqliteStore::open(&path, Duration::from_millis(100)).unwrap();
        let matter = Matter::from_intake(
            FirmId::new("firm-1").unwrap(),
            PipelineId::new("litigation").unwrap(),
            Timestamp::now(),
        );
        store.insert_matter(&matter).await.unwrap();
        matter.id
    };

    let reopened = SqliteStore::open(&path, Duration::from_millis(100)).unwrap();
    assert_eq!(reopened.schema_version().await.unwrap(), CURRENT_SCHEMA_VERSION);
    assert!(reopened.load_matter(matter_id).await.unwrap().is_some());
}

#[test]
fn newer_schemas_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);
             INSERT INTO schema_migrations VALUES (99, 'later');",
        )
        .unwrap();
    }
    let err = SqliteStore::open(&path, Duration::from_millis(100))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        StoreError::UnsupportedSchemaVersion { found: 99, .. }
    ));
}
