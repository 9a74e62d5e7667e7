//! Meetings and the negotiation state machine.
//!
//! ```text
//!              reschedule (new proposed start + note)
//!             ┌──────────────┐
//!             ▼              │
//!   request ─► requested ────┴──► accepted ──► completed
//!                 │     accept       │
//!                 └──────────────────┴──► cancelled
//! ```
//!
//! Each transition function takes the current record and returns the next one.
//! They never touch storage, so the coordinator can validate and build the
//! new state before opening a commit.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
    CoordinationError, MatterId, MeetingId, MeetingKind, MeetingStatus, PartyId, Timestamp, UserId,
};

/// Default length of a confirmed session.
pub const DEFAULT_SESSION_LENGTH_MINUTES: i64 = 60;

/// Longest session an acceptance or the configuration may ask for: one day.
pub const MAX_SESSION_LENGTH_MINUTES: i64 = 24 * 60;

/// One negotiation thread between an internal and an external party.
///
/// `confirmed_start` / `confirmed_end` are set exactly when `status` is
/// `accepted` or `completed`; see [`Meeting::check_invariants`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub matter_id: MatterId,
    pub internal_party: UserId,
    pub external_party: PartyId,
    pub kind: MeetingKind,
    pub status: MeetingStatus,
    pub proposed_start: Timestamp,
    pub confirmed_start: Option<Timestamp>,
    pub confirmed_end: Option<Timestamp>,
    pub video_link: Option<String>,
    /// Physical meetings only; free text.
    pub location: Option<String>,
    /// Rationale for the latest reschedule, visible to staff only.
    pub internal_note: Option<String>,
    pub reschedule_count: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An external party's request for a meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub internal_party: UserId,
    pub external_party: PartyId,
    pub kind: MeetingKind,
    pub proposed_start: Timestamp,
    #[serde(default)]
    pub location: Option<String>,
}

/// The internal party's acceptance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Acceptance {
    /// Defaults to the proposed start.
    pub confirmed_start: Option<Timestamp>,
    /// Mandatory for virtual meetings.
    pub video_link: Option<String>,
    /// Overrides the configured session length.
    pub duration_minutes: Option<i64>,
}

impl Meeting {
    /// Opens a negotiation in `requested`.
    pub fn from_request(matter_id: MatterId, request: MeetingRequest, now: Timestamp) -> Self {
        Self {
            id: MeetingId::new_random(),
            matter_id,
            internal_party: request.internal_party,
            external_party: request.external_party,
            kind: request.kind,
            status: MeetingStatus::Requested,
            proposed_start: request.proposed_start,
            confirmed_start: None,
            confirmed_end: None,
            video_link: None,
            location: request.location,
            internal_note: None,
            reschedule_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Confirms the meeting.
    ///
    /// `session_length_minutes` applies unless the acceptance overrides it.
    ///
    /// # Errors
    ///
    /// - [`CoordinationError::InvalidTransition`] unless the meeting is `requested`.
    /// - [`CoordinationError::Validation`] for a virtual meeting without a video
    ///   link, or a duration outside `1..=MAX_SESSION_LENGTH_MINUTES`.
    pub fn accept(
        &self,
        acceptance: Acceptance,
        session_length_minutes: i64,
        now: Timestamp,
    ) -> Result<Self, CoordinationError> {
        self.require(MeetingStatus::Requested, "accept meeting")?;

        let video_link = acceptance
            .video_link
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        if self.kind == MeetingKind::Virtual && video_link.is_none() {
            return Err(CoordinationError::validation(
                "a video link is required to accept a virtual meeting",
            ));
        }

        let minutes = acceptance.duration_minutes.unwrap_or(session_length_minutes);
        if minutes <= 0 || minutes > MAX_SESSION_LENGTH_MINUTES {
            return Err(CoordinationError::validation(format!(
                "meeting duration must be between 1 and {MAX_SESSION_LENGTH_MINUTES} minutes, \
                 got {minutes}"
            )));
        }

        let start = acceptance.confirmed_start.unwrap_or(self.proposed_start);
        let end = Duration::try_minutes(minutes)
            .and_then(|length| start.checked_plus(length))
            .ok_or_else(|| {
                CoordinationError::validation(format!(
                    "a {minutes}-minute meeting starting at {start} ends out of range"
                ))
            })?;
        let mut next = self.clone();
        next.status = MeetingStatus::Accepted;
        next.confirmed_start = Some(start);
        next.confirmed_end = Some(end);
        next.video_link = video_link;
        next.updated_at = now;
        Ok(next)
    }

    /// Counter-proposes a new start; the meeting returns to `requested`.
    ///
    /// # Errors
    ///
    /// - [`CoordinationError::InvalidTransition`] unless the meeting is `requested`.
    /// - [`CoordinationError::Validation`] for a blank note.
    pub fn reschedule(
        &self,
        new_proposed_start: Timestamp,
        note: &str,
        now: Timestamp,
    ) -> Result<Self, CoordinationError> {
        self.require(MeetingStatus::Requested, "reschedule meeting")?;
        let note = note.trim();
        if note.is_empty() {
            return Err(CoordinationError::validation(
                "a reschedule needs a note explaining why",
            ));
        }
        let mut next = self.clone();
        next.status = MeetingStatus::Requested;
        next.proposed_start = new_proposed_start;
        next.internal_note = Some(note.to_string());
        next.reschedule_count += 1;
        next.updated_at = now;
        Ok(next)
    }

    /// Cancels from any non-terminal status, clearing a confirmed slot.
    pub fn cancel(&self, now: Timestamp) -> Result<Self, CoordinationError> {
        if self.status.is_terminal() {
            return Err(CoordinationError::invalid_transition(
                "cancel meeting",
                self.status,
            ));
        }
        let mut next = self.clone();
        next.status = MeetingStatus::Cancelled;
        next.confirmed_start = None;
        next.confirmed_end = None;
        next.updated_at = now;
        Ok(next)
    }

    /// Marks an accepted meeting as held once its confirmed start has passed.
    pub fn complete(&self, now: Timestamp) -> Result<Self, CoordinationError> {
        self.require(MeetingStatus::Accepted, "complete meeting")?;
        if let Some(start) = self.confirmed_start.filter(|start| *start > now) {
            return Err(CoordinationError::validation(format!(
                "meeting starts at {start}; it cannot be completed before then"
            )));
        }
        let mut next = self.clone();
        next.status = MeetingStatus::Completed;
        next.updated_at = now;
        Ok(next)
    }

    /// Checks the confirmed-slot invariant.
    ///
    /// Holds when the confirmed fields are present exactly for `accepted` /
    /// `completed`, and end equals start plus `session_length_minutes` unless
    /// `allow_override` accepts any positive length.
    pub fn check_invariants(&self, session_length_minutes: i64, allow_override: bool) -> bool {
        match (self.confirmed_start, self.confirmed_end) {
            (Some(start), Some(end)) => {
                self.status.has_confirmed_slot()
                    && if allow_override {
                        end > start
                    } else {
                        Duration::try_minutes(session_length_minutes)
                            .and_then(|length| start.checked_plus(length))
                            == Some(end)
                    }
            }
            (None, None) => !self.status.has_confirmed_slot(),
            _ => false,
        }
    }

    fn require(&self, status: MeetingStatus, operation: &str) -> Result<(), CoordinationError> {
        if self.status == status {
            Ok(())
        } else {
            Err(CoordinationError::invalid_transition(operation, self.status))
        }
    }
}
