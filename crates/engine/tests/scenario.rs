mod common;

use coordination::{
    CoordinationError, CoordinationStore, HistoryAction, HistoryPayload, LifecycleState,
    TaskOrigin, TaskStatus,
};
use common::{harness, stage_id, user};

#[tokio::test]
async fn intake_to_filing_walkthrough() {
    let h = harness().await;
    let cm = user("cm-1");

    let matter = h.engine.transition(h.matter, &stage_id("intake"), &cm).await.unwrap();
    assert_eq!(matter.current_stage, Some(stage_id("intake")));
    assert_eq!(matter.lifecycle, LifecycleState::InProgress);
    assert_eq!(h.engine.timeline(h.matter).await.unwrap().len(), 1);

    let created = h
        .engine
        .materialize_for_stage(h.matter, &stage_id("intake"), &cm)
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert!(created
        .iter()
        .all(|t| matches!(t.origin, TaskOrigin::Template(_)) && t.status == TaskStatus::Pending));
    assert_eq!(h.engine.timeline(h.matter).await.unwrap().len(), 2);

    let again = h
        .engine
        .materialize_for_stage(h.matter, &stage_id("intake"), &cm)
        .await
        .unwrap();
    assert!(again.is_empty());
    let timeline = h.engine.timeline(h.matter).await.unwrap();
    assert_eq!(timeline.len(), 3);
    assert!(matches!(
        &timeline[0].payload,
        HistoryPayload::TasksMaterialized { tasks, .. } if tasks.is_empty()
    ));

    let matter = h.engine.transition(h.matter, &stage_id("filing"), &cm).await.unwrap();
    assert_eq!(matter.current_stage, Some(stage_id("filing")));
    assert_eq!(matter.version, 4);

    let timeline = h.engine.timeline(h.matter).await.unwrap();
    let actions: Vec<HistoryAction> = timeline.iter().rev().map(|e| e.action).collect();
    assert_eq!(
        actions,
        [
            HistoryAction::StageTransitioned,
            HistoryAction::TasksMaterialized,
            HistoryAction::TasksMaterialized,
            HistoryAction::StageTransitioned,
        ]
    );
    let stored = h.store.load_tasks(h.matter, None).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn backwards_non_adjacent_transition_is_allowed() {
    let h = harness().await;
    let cm = user("cm-1");
    h.engine.transition(h.matter, &stage_id("filing"), &cm).await.unwrap();

    let matter = h.engine.transition(h.matter, &stage_id("intake"), &cm).await.unwrap();
    assert_eq!(matter.current_stage, Some(stage_id("intake")));

    let timeline = h.engine.timeline(h.matter).await.unwrap();
    assert!(matches!(
        &timeline[0].payload,
        HistoryPayload::StageTransitioned { from: Some(from), to, .. }
            if from.as_str() == "filing" && to.as_str() == "intake"
    ));
}

#[tokio::test]
async fn progress_follows_the_current_stage() {
    let h = harness().await;
    let cm = user("cm-1");
    assert_eq!(h.engine.progress(h.matter).await.unwrap().as_f64(), 0.0);

    h.engine.transition(h.matter, &stage_id("review"), &cm).await.unwrap();
    let value = h.engine.progress(h.matter).await.unwrap().as_f64();
    assert!((value - 2.0 / 3.0).abs() < 1e-9);

    h.engine.transition(h.matter, &stage_id("filing"), &cm).await.unwrap();
    assert_eq!(h.engine.progress(h.matter).await.unwrap().as_f64(), 1.0);
}

#[tokio::test]
async fn stages_outside_the_pipeline_are_rejected() {
    let h = harness().await;
    let err = h
        .engine
        .transition(h.matter, &stage_id("appeal"), &user("cm-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::InvalidStageForPipeline { .. }), "{err:?}");

    let err = h
        .engine
        .materialize_for_stage(h.matter, &stage_id("appeal"), &user("cm-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::InvalidStageForPipeline { .. }), "{err:?}");
    assert!(h.engine.timeline(h.matter).await.unwrap().is_empty());
}

#[tokio::test]
async fn stages_without_templates_still_record_the_call() {
    let h = harness().await;
    let created = h
        .engine
        .materialize_for_stage(h.matter, &stage_id("filing"), &user("cm-1"))
        .await
        .unwrap();
    assert!(created.is_empty());
    assert_eq!(h.engine.timeline(h.matter).await.unwrap().len(), 1);
}

#[tokio::test]
async fn review_then_close() {
    let h = harness().await;
    let cm = user("cm-1");
    let matter = h.engine.begin_review(h.matter, &cm).await.unwrap();
    assert_eq!(matter.lifecycle, LifecycleState::UnderReview);

    let err = h.engine.begin_review(h.matter, &cm).await.unwrap_err();
    assert!(matches!(err, CoordinationError::InvalidTransition { .. }), "{err:?}");

    let matter = h.engine.transition(h.matter, &stage_id("intake"), &cm).await.unwrap();
    assert_eq!(matter.lifecycle, LifecycleState::InProgress);

    let matter = h.engine.close_matter(h.matter, &cm).await.unwrap();
    assert_eq!(matter.lifecycle, LifecycleState::Closed);
    let err = h.engine.close_matter(h.matter, &cm).await.unwrap_err();
    assert!(matches!(err, CoordinationError::MatterClosed { .. }), "{err:?}");
}

#[tokio::test]
async fn stage_readiness_lists_outstanding_required_tasks() {
    let h = harness().await;
    let cm = user("cm-1");
    let intake = stage_id("intake");
    let created = h.engine.materialize_for_stage(h.matter, &intake, &cm).await.unwrap();

    let readiness = h.engine.stage_readiness(h.matter, &intake).await.unwrap();
    assert_eq!(readiness.required, 1);
    assert!(!readiness.is_ready());

    let required = created.iter().find(|t| t.required).unwrap();
    h.engine
        .update_task_status(required.id, TaskStatus::Completed, &cm)
        .await
        .unwrap();
    assert!(h.engine.stage_readiness(h.matter, &intake).await.unwrap().is_ready());
}

#[tokio::test]
async fn derived_due_dates_follow_the_template_offset() {
    let h = harness().await;
    let created = h
        .engine
        .materialize_for_stage(h.matter, &stage_id("intake"), &user("cm-1"))
        .await
        .unwrap();
    for task in created {
        let due = task.due_at.unwrap();
        let offset = due.as_micros() - task.created_at.as_micros();
        assert_eq!(offset, 5 * 24 * 3600 * 1_000_000);
    }
}
