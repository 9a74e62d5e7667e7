//! Rows of the assignment registry.

use serde::{Deserialize, Serialize};

use crate::{AssignmentId, AssignmentRole, MatterId, Timestamp, UserId};

/// One (matter, role, user) row.
///
/// Rows are never overwritten. A newer assignment sets `superseded_at` on the
/// previous holder's row; the current holder is the row with none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub matter_id: MatterId,
    pub role: AssignmentRole,
    pub user_id: UserId,
    pub assigned_by: UserId,
    pub assigned_at: Timestamp,
    pub superseded_at: Option<Timestamp>,
}

impl Assignment {
    /// Returns `true` while this row is the one answering "who holds the role now".
    pub fn is_current(&self) -> bool {
        self.superseded_at.is_none()
    }
}
