mod common;

use coordination::{
    Acceptance, CoordinationError, CoordinationStore, MeetingKind, MeetingRequest, MeetingStatus,
    PartyId,
};
use common::{at, harness, user};

fn request(kind: MeetingKind, start: &str) -> MeetingRequest {
    MeetingRequest {
        internal_party: user("assoc-1"),
        external_party: PartyId::new("client-7").unwrap(),
        kind,
        proposed_start: at(start),
        location: match kind {
            MeetingKind::Physical => Some("Room 4B".into()),
            MeetingKind::Virtual => None,
        },
    }
}

fn with_link() -> Acceptance {
    Acceptance {
        video_link: Some("https://meet.example.com/matter".into()),
        ..Acceptance::default()
    }
}

#[tokio::test]
async fn accepting_confirms_a_one_hour_slot_at_the_proposed_time() {
    let h = harness().await;
    let assoc = user("assoc-1");
    let meeting = h
        .engine
        .request_meeting(h.matter, request(MeetingKind::Virtual, "2030-05-01T14:00:00Z"), &assoc)
        .await
        .unwrap();
    assert_eq!(meeting.status, MeetingStatus::Requested);

    let accepted = h.engine.accept_meeting(meeting.id, with_link(), &assoc).await.unwrap();
    assert_eq!(accepted.status, MeetingStatus::Accepted);
    assert_eq!(accepted.confirmed_start, Some(at("2030-05-01T14:00:00Z")));
    assert_eq!(accepted.confirmed_end, Some(at("2030-05-01T15:00:00Z")));
    assert!(accepted.check_invariants(60, false));

    let stored = h.store.load_meeting(meeting.id).await.unwrap().unwrap();
    assert_eq!(stored, accepted);
}

#[tokio::test]
async fn virtual_meetings_need_a_video_link() {
    let h = harness().await;
    let assoc = user("assoc-1");
    let meeting = h
        .engine
        .request_meeting(h.matter, request(MeetingKind::Virtual, "2030-05-01T14:00:00Z"), &assoc)
        .await
        .unwrap();
    let err = h
        .engine
        .accept_meeting(meeting.id, Acceptance::default(), &assoc)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::Validation { .. }), "{err:?}");
    assert_eq!(h.engine.timeline(h.matter).await.unwrap().len(), 1);

    let physical = h
        .engine
        .request_meeting(h.matter, request(MeetingKind::Physical, "2030-05-02T09:00:00Z"), &assoc)
        .await
        .unwrap();
    let accepted = h
        .engine
        .accept_meeting(
            physical.id,
            Acceptance {
                duration_minutes: Some(90),
                ..Acceptance::default()
            },
            &assoc,
        )
        .await
        .unwrap();
    assert_eq!(accepted.confirmed_end, Some(at("2030-05-02T10:30:00Z")));
}

#[tokio::test]
async fn reschedule_returns_to_requested_and_counts() {
    let h = harness().await;
    let assoc = user("assoc-1");
    let meeting = h
        .engine
        .request_meeting(h.matter, request(MeetingKind::Virtual, "2030-05-01T14:00:00Z"), &assoc)
        .await
        .unwrap();

    let moved = h
        .engine
        .reschedule_meeting(meeting.id, at("2030-05-03T10:00:00Z"), "hearing moved", &assoc)
        .await
        .unwrap();
    assert_eq!(moved.status, MeetingStatus::Requested);
    assert_eq!(moved.reschedule_count, 1);
    assert_eq!(moved.internal_note.as_deref(), Some("hearing moved"));
    assert!(moved.confirmed_start.is_none());

    let accepted = h.engine.accept_meeting(meeting.id, with_link(), &assoc).await.unwrap();
    assert_eq!(accepted.confirmed_start, Some(at("2030-05-03T10:00:00Z")));

    let err = h
        .engine
        .reschedule_meeting(meeting.id, at("2030-05-04T10:00:00Z"), "again", &assoc)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::InvalidTransition { .. }), "{err:?}");
}

#[tokio::test]
async fn cancelling_clears_the_confirmed_slot() {
    let h = harness().await;
    let assoc = user("assoc-1");
    let meeting = h
        .engine
        .request_meeting(h.matter, request(MeetingKind::Virtual, "2030-05-01T14:00:00Z"), &assoc)
        .await
        .unwrap();
    h.engine.accept_meeting(meeting.id, with_link(), &assoc).await.unwrap();

    let cancelled = h.engine.cancel_meeting(meeting.id, &assoc).await.unwrap();
    assert_eq!(cancelled.status, MeetingStatus::Cancelled);
    assert!(cancelled.confirmed_start.is_none() && cancelled.confirmed_end.is_none());
    assert!(cancelled.check_invariants(60, false));

    let err = h.engine.cancel_meeting(meeting.id, &assoc).await.unwrap_err();
    assert!(matches!(err, CoordinationError::InvalidTransition { .. }), "{err:?}");
    let err = h.engine.accept_meeting(meeting.id, with_link(), &assoc).await.unwrap_err();
    assert!(matches!(err, CoordinationError::InvalidTransition { .. }), "{err:?}");
}

#[tokio::test]
async fn completion_waits_for_the_confirmed_start() {
    let h = harness().await;
    let assoc = user("assoc-1");

    let upcoming = h
        .engine
        .request_meeting(h.matter, request(MeetingKind::Virtual, "2030-05-01T14:00:00Z"), &assoc)
        .await
        .unwrap();
    h.engine.accept_meeting(upcoming.id, with_link(), &assoc).await.unwrap();
    let err = h.engine.complete_meeting(upcoming.id, &assoc).await.unwrap_err();
    assert!(matches!(err, CoordinationError::Validation { .. }), "{err:?}");

    let held = h
        .engine
        .request_meeting(h.matter, request(MeetingKind::Virtual, "2020-05-01T14:00:00Z"), &assoc)
        .await
        .unwrap();
    let err = h.engine.complete_meeting(held.id, &assoc).await.unwrap_err();
    assert!(matches!(err, CoordinationError::InvalidTransition { .. }), "{err:?}");

    h.engine.accept_meeting(held.id, with_link(), &assoc).await.unwrap();
    let completed = h.engine.complete_meeting(held.id, &assoc).await.unwrap();
    assert_eq!(completed.status, MeetingStatus::Completed);
    assert!(completed.confirmed_start.is_some());
    assert!(completed.check_invariants(60, false));

    assert_eq!(h.engine.meetings(h.matter).await.unwrap().len(), 2);
}

#[tokio::test]
async fn oversized_durations_leave_the_meeting_requested() {
    let h = harness().await;
    let assoc = user("assoc-1");
    let meeting = h
        .engine
        .request_meeting(h.matter, request(MeetingKind::Physical, "2030-05-01T14:00:00Z"), &assoc)
        .await
        .unwrap();

    for minutes in [24 * 60 + 1, i64::MAX / 60, 200_000_000_000] {
        let err = h
            .engine
            .accept_meeting(
                meeting.id,
                Acceptance {
                    duration_minutes: Some(minutes),
                    ..Acceptance::default()
                },
                &assoc,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::Validation { .. }), "{minutes}: {err:?}");
    }

    let stored = h.store.load_meeting(meeting.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MeetingStatus::Requested);
    assert_eq!(stored.confirmed_end, None);
    assert_eq!(h.engine.timeline(h.matter).await.unwrap().len(), 1);
}
