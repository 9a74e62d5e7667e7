//! Shared value types for the coordination domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. progress is in `[0.0, 1.0]`) or form
//! closed enumerations persisted as stable snake_case strings.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for closed enumerations that are persisted by their tag string.
// Generates: as_str(), parse(), Display.
// ---------------------------------------------------------------------------
macro_rules! tagged_enum {
    (
        $(#[$attr:meta])*
        $name:ident {
            $( $(#[$vattr:meta])* $variant:ident => $tag:literal ),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vattr])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Returns the stable tag used in storage and wire payloads.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $tag ),+
                }
            }

            /// Parses a stable tag, returning `None` for unknown values.
            pub fn parse(tag: &str) -> Option<Self> {
                match tag {
                    $( $tag => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Lifecycle and status enumerations
// ---------------------------------------------------------------------------

tagged_enum! {
    /// Coarse lifecycle of a matter, independent of its pipeline stage.
    ///
    /// `Closed` is terminal: once reached, no coordination operation may
    /// mutate the matter.
    LifecycleState {
        /// Accepted by intake, not yet looked at.
        Submitted => "submitted",
        /// Being reviewed before work starts.
        UnderReview => "under_review",
        /// Work is underway on a pipeline stage.
        InProgress => "in_progress",
        /// Terminal.
        Closed => "closed",
    }
}

impl LifecycleState {
    /// Returns `true` for the terminal state.
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

tagged_enum! {
    /// Status of a task. Tasks are never deleted; completion is a status.
    TaskStatus {
        Pending => "pending",
        InProgress => "in_progress",
        UnderReview => "under_review",
        Completed => "completed",
        Blocked => "blocked",
    }
}

tagged_enum! {
    /// Task priority, ordered from least to most pressing.
    TaskPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

tagged_enum! {
    /// Whether a meeting happens over video or in person.
    MeetingKind {
        Virtual => "virtual",
        Physical => "physical",
    }
}

tagged_enum! {
    /// Negotiation status of a meeting.
    ///
    /// A reschedule returns the meeting to `Requested`; there is no separate
    /// rejected or rescheduling status.
    MeetingStatus {
        /// A start time is proposed and awaits the internal party.
        Requested => "requested",
        /// A confirmed slot is agreed.
        Accepted => "accepted",
        /// The confirmed slot has taken place. Terminal.
        Completed => "completed",
        /// Explicitly cancelled. Terminal.
        Cancelled => "cancelled",
    }
}

impl MeetingStatus {
    /// Returns `true` once no further negotiation is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns `true` for the statuses that carry a confirmed slot.
    pub fn has_confirmed_slot(self) -> bool {
        matches!(self, Self::Accepted | Self::Completed)
    }
}

tagged_enum! {
    /// A responsibility on a matter tracked by the assignment registry.
    AssignmentRole {
        Associate => "associate",
        CaseManager => "case_manager",
    }
}

tagged_enum! {
    /// A capability checked with the authorization collaborator before every
    /// mutating operation.
    Capability {
        TransitionStage => "transition_stage",
        MaterializeTasks => "materialize_tasks",
        ManageTasks => "manage_tasks",
        NegotiateMeeting => "negotiate_meeting",
        AssignCase => "assign_case",
        ManageLifecycle => "manage_lifecycle",
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Display-only fraction of a pipeline a matter has reached, in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Progress(f64);

impl Progress {
    /// Creates a [`Progress`], returning `None` if `value` is outside `[0.0, 1.0]`.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Progress of a matter that is not yet on a pipeline.
    pub fn zero() -> Self {
        Self(0.0)
    }

    /// Returns the fraction as an `f64` in `[0.0, 1.0]`.
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}%", self.0 * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp with microsecond precision.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly. Persisted as integer microseconds since the Unix epoch, which is
/// also the ordering key of the history timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time, truncated to microseconds.
    pub fn now() -> Self {
        let now = Utc::now();
        Self::from_micros(now.timestamp_micros()).unwrap_or(Self(now))
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a [`Timestamp`] from microseconds since the Unix epoch.
    ///
    /// Returns `None` when the value is out of chrono's representable range.
    pub fn from_micros(micros: i64) -> Option<Self> {
        DateTime::from_timestamp_micros(micros).map(Self)
    }

    /// Parses an RFC 3339 string (e.g. `"2026-03-01T15:00:00Z"`).
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns microseconds since the Unix epoch.
    pub fn as_micros(self) -> i64 {
        self.0.timestamp_micros()
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns this timestamp shifted by `duration`, or `None` when the
    /// result leaves chrono's representable range.
    pub fn checked_plus(self, duration: Duration) -> Option<Self> {
        self.0.checked_add_signed(duration).map(Self)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_for_every_variant() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(*status));
        }
        for state in LifecycleState::ALL {
            assert_eq!(LifecycleState::parse(state.as_str()), Some(*state));
        }
        assert_eq!(MeetingStatus::parse("rejected"), None);
    }

    #[test]
    fn serde_uses_the_storage_tag() {
        let json = serde_json::to_string(&AssignmentRole::CaseManager).unwrap();
        assert_eq!(json, "\"case_manager\"");
    }

    #[test]
    fn only_accepted_and_completed_carry_a_slot() {
        assert!(MeetingStatus::Accepted.has_confirmed_slot());
        assert!(MeetingStatus::Completed.has_confirmed_slot());
        assert!(!MeetingStatus::Requested.has_confirmed_slot());
        assert!(!MeetingStatus::Cancelled.has_confirmed_slot());
    }

    #[test]
    fn progress_rejects_out_of_range_values() {
        assert!(Progress::new(1.5).is_none());
        assert!(Progress::new(f64::NAN).is_none());
        assert_eq!(Progress::new(0.5).map(Progress::as_f64), Some(0.5));
    }

    #[test]
    fn timestamp_micros_round_trip() {
        let ts = Timestamp::parse_rfc3339("2026-03-01T15:00:00.123456Z").unwrap();
        assert_eq!(Timestamp::from_micros(ts.as_micros()), Some(ts));
        assert_eq!(
            ts.checked_plus(Duration::hours(1)).unwrap().to_string(),
            "2026-03-01T16:00:00.123456+00:00"
        );
    }

    #[test]
    fn shifting_out_of_range_is_none() {
        let ts = Timestamp::parse_rfc3339("2026-03-01T15:00:00Z").unwrap();
        assert!(ts.checked_plus(Duration::MAX).is_none());
        assert!(ts.checked_plus(Duration::MIN).is_none());
    }
}
