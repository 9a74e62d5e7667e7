//! Meeting negotiation: request, accept, reschedule, cancel and complete.

use coordination::{
    Acceptance, Capability, CoordinationError, EntityKind, HistoryPayload, Matter, MatterId,
    Meeting, MeetingId, MeetingRequest, Mutation, Timestamp, UserId,
};

use crate::CoordinationEngine;

impl CoordinationEngine {
    /// Opens a negotiation in `requested` with the external party's proposal.
    #[tracing::instrument(skip_all, fields(matter_id = %matter, actor = %actor))]
    pub async fn request_meeting(
        &self,
        matter: MatterId,
        request: MeetingRequest,
        actor: &UserId,
    ) -> Result<Meeting, CoordinationError> {
        self.authorize(actor, matter, Capability::NegotiateMeeting).await?;
        let current = self.require_open_matter(matter).await?;

        let now = Timestamp::now();
        let meeting = Meeting::from_request(matter, request, now);
        self.record(
            &current,
            actor,
            vec![Mutation::InsertMeeting(meeting.clone())],
            HistoryPayload::MeetingRequested {
                meeting_id: meeting.id,
                kind: meeting.kind,
                external_party: meeting.external_party.clone(),
                proposed_start: meeting.proposed_start,
            },
            now,
        )
        .await?;
        Ok(meeting)
    }

    /// Confirms a `requested` meeting.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `requested`; `Validation` for a virtual
    /// meeting without a video link.
    #[tracing::instrument(skip_all, fields(meeting_id = %meeting, actor = %actor))]
    pub async fn accept_meeting(
        &self,
        meeting: MeetingId,
        acceptance: Acceptance,
        actor: &UserId,
    ) -> Result<Meeting, CoordinationError> {
        let (current, existing) = self.meeting_for_update(meeting, actor).await?;
        let now = Timestamp::now();
        let next = existing.accept(acceptance, self.settings.session_length_minutes, now)?;
        let (Some(confirmed_start), Some(confirmed_end)) = (next.confirmed_start, next.confirmed_end)
        else {
            return Err(CoordinationError::validation(format!(
                "meeting {meeting} was accepted without a confirmed slot"
            )));
        };
        self.record(
            &current,
            actor,
            vec![Mutation::UpdateMeeting(next.clone())],
            HistoryPayload::MeetingAccepted {
                meeting_id: meeting,
                confirmed_start,
                confirmed_end,
                video_link: next.video_link.clone(),
            },
            now,
        )
        .await?;
        Ok(next)
    }

    /// Counter-proposes `new_start`; the meeting stays `requested`.
    #[tracing::instrument(skip_all, fields(meeting_id = %meeting, actor = %actor))]
    pub async fn reschedule_meeting(
        &self,
        meeting: MeetingId,
        new_start: Timestamp,
        note: &str,
        actor: &UserId,
    ) -> Result<Meeting, CoordinationError> {
        let (current, existing) = self.meeting_for_update(meeting, actor).await?;
        let now = Timestamp::now();
        let next = existing.reschedule(new_start, note, now)?;
        self.record(
            &current,
            actor,
            vec![Mutation::UpdateMeeting(next.clone())],
            HistoryPayload::MeetingRescheduled {
                meeting_id: meeting,
                previous_start: existing.proposed_start,
                proposed_start: next.proposed_start,
                note: next.internal_note.clone().unwrap_or_default(),
            },
            now,
        )
        .await?;
        Ok(next)
    }

    /// Cancels a meeting that is not yet completed or cancelled.
    #[tracing::instrument(skip_all, fields(meeting_id = %meeting, actor = %actor))]
    pub async fn cancel_meeting(
        &self,
        meeting: MeetingId,
        actor: &UserId,
    ) -> Result<Meeting, CoordinationError> {
        let (current, existing) = self.meeting_for_update(meeting, actor).await?;
        let now = Timestamp::now();
        let next = existing.cancel(now)?;
        self.record(
            &current,
            actor,
            vec![Mutation::UpdateMeeting(next.clone())],
            HistoryPayload::MeetingCancelled {
                meeting_id: meeting,
                previous_status: existing.status,
            },
            now,
        )
        .await?;
        Ok(next)
    }

    /// Marks an accepted meeting as held once its confirmed start has passed.
    #[tracing::instrument(skip_all, fields(meeting_id = %meeting, actor = %actor))]
    pub async fn complete_meeting(
        &self,
        meeting: MeetingId,
        actor: &UserId,
    ) -> Result<Meeting, CoordinationError> {
        let (current, existing) = self.meeting_for_update(meeting, actor).await?;
        let now = Timestamp::now();
        let next = existing.complete(now)?;
        self.record(
            &current,
            actor,
            vec![Mutation::UpdateMeeting(next.clone())],
            HistoryPayload::MeetingCompleted {
                meeting_id: meeting,
            },
            now,
        )
        .await?;
        Ok(next)
    }

    /// Every meeting of the matter, in request order.
    pub async fn meetings(&self, matter: MatterId) -> Result<Vec<Meeting>, CoordinationError> {
        self.require_matter(matter).await?;
        self.store.load_meetings(matter).await
    }

    /// Loads the meeting and its open matter for a status change.
    ///
    /// The meeting is read again after the matter so that its state is no
    /// older than the version the commit will be checked against.
    async fn meeting_for_update(
        &self,
        meeting: MeetingId,
        actor: &UserId,
    ) -> Result<(Matter, Meeting), CoordinationError> {
        let owner = self.require_meeting(meeting).await?.matter_id;
        self.authorize(actor, owner, Capability::NegotiateMeeting).await?;
        let current = self.require_open_matter(owner).await?;
        let existing = self.require_meeting(meeting).await?;
        Ok((current, existing))
    }

    async fn require_meeting(&self, meeting: MeetingId) -> Result<Meeting, CoordinationError> {
        self.store
            .load_meeting(meeting)
            .await?
            .ok_or_else(|| CoordinationError::not_found(EntityKind::Meeting, meeting))
    }
}
