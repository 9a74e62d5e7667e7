//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example, a
//! [`TaskId`] with a [`MeetingId`] even though both are UUIDs under the hood.
//!
//! Configuration-owned concepts (pipelines, stages, templates) and identities
//! issued by the external platform (users, firms, external parties) are
//! string-backed. Records the engine creates itself are UUID-backed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for Uuid-wrapped newtypes (engine-generated records).
// Generates: struct (Copy), new_random(), from_uuid(), as_uuid(), parse(), Display.
// ---------------------------------------------------------------------------
macro_rules! uuid_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID (e.g. read back from storage).
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Parses the hyphenated textual form, returning `None` when malformed.
            pub fn parse(value: &str) -> Option<Self> {
                Uuid::parse_str(value).ok().map(Self)
            }

            /// Returns the underlying [`Uuid`].
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed, engine-generated
// ---------------------------------------------------------------------------

uuid_id! {
    /// Identifies one legal matter (case).
    ///
    /// Issued when the external intake process accepts the matter.
    MatterId
}

uuid_id! {
    /// Identifies a task, whether created manually or materialized from a template.
    TaskId
}

uuid_id! {
    /// Identifies one meeting negotiation thread.
    MeetingId
}

uuid_id! {
    /// Identifies a single appended history event.
    HistoryEventId
}

uuid_id! {
    /// Identifies one row in the assignment registry.
    AssignmentId
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed, configuration and platform identities
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a pipeline definition in the catalog (e.g. `"litigation"`).
    PipelineId
}

string_id! {
    /// Identifies a stage within a pipeline (e.g. `"intake"`).
    ///
    /// Stage ids are unique across the catalog, not only within one pipeline.
    StageId
}

string_id! {
    /// Identifies a reusable task template bound to a stage.
    TemplateId
}

string_id! {
    /// Identifies a staff user issued by the identity platform.
    ///
    /// Every mutating operation takes the acting user explicitly.
    UserId
}

string_id! {
    /// Identifies the law firm owning a matter.
    FirmId
}

string_id! {
    /// Identifies the external party (typically the client) in a meeting.
    PartyId
}
