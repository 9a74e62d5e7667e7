mod common;

use std::sync::Arc;

use coordination::{CoordinationError, CoordinationStore, HistoryAction, HistoryPayload};
use common::{harness, stage_id, user};
use engine::retry_on_conflict;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_materializations_create_each_task_once() {
    let h = harness().await;
    let intake = stage_id("intake");

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&h.engine);
        let matter = h.matter;
        let stage = intake.clone();
        let actor = user(&format!("staff-{i}"));
        handles.push(tokio::spawn(async move {
            let settings = engine.settings().retry;
            retry_on_conflict(&settings, || engine.materialize_for_stage(matter, &stage, &actor))
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        created += handle.await.unwrap().unwrap().len();
    }
    assert_eq!(created, 2);

    let tasks = h.store.load_tasks(h.matter, Some(&intake)).await.unwrap();
    assert_eq!(tasks.len(), 2);

    let timeline = h.engine.timeline(h.matter).await.unwrap();
    assert_eq!(timeline.len(), 8);
    let listed: usize = timeline
        .iter()
        .map(|e| match &e.payload {
            HistoryPayload::TasksMaterialized { tasks, .. } => tasks.len(),
            _ => 0,
        })
        .sum();
    assert_eq!(listed, 2);
    assert!(timeline.iter().all(|e| e.action == HistoryAction::TasksMaterialized));
}

#[tokio::test]
async fn a_stale_writer_gets_conflict_and_nothing_is_written() {
    let h = harness().await;
    let cm = user("cm-1");
    let stale = h.store.load_matter(h.matter).await.unwrap().unwrap();

    h.engine.transition(h.matter, &stage_id("intake"), &cm).await.unwrap();

    let mut next = stale.clone();
    next.current_stage = Some(stage_id("filing"));
    let err = h
        .store
        .commit(coordination::MatterCommit {
            matter_id: h.matter,
            expected_version: stale.version,
            mutations: vec![coordination::Mutation::UpdateMatter(next)],
            event: coordination::NewHistoryEvent::new(
                h.matter,
                cm.clone(),
                HistoryPayload::StageTransitioned {
                    from: None,
                    to: stage_id("filing"),
                    lifecycle_from: stale.lifecycle,
                    lifecycle_to: stale.lifecycle,
                },
                coordination::Timestamp::now(),
            ),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::Conflict { expected: 0, actual: 1, .. }), "{err:?}");

    let matter = h.store.load_matter(h.matter).await.unwrap().unwrap();
    assert_eq!(matter.current_stage, Some(stage_id("intake")));
    assert_eq!(h.engine.timeline(h.matter).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transitions_serialize_through_retries() {
    let h = harness().await;
    let targets = ["intake", "review", "filing", "review", "intake"];

    let mut handles = Vec::new();
    for (i, target) in targets.iter().enumerate() {
        let engine = Arc::clone(&h.engine);
        let matter = h.matter;
        let stage = stage_id(target);
        let actor = user(&format!("staff-{i}"));
        handles.push(tokio::spawn(async move {
            let settings = engine.settings().retry;
            retry_on_conflict(&settings, || engine.transition(matter, &stage, &actor)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let matter = h.store.load_matter(h.matter).await.unwrap().unwrap();
    assert_eq!(matter.version, targets.len() as i64);
    assert_eq!(h.engine.timeline(h.matter).await.unwrap().len(), targets.len());
}
