//! The authenticated identity held by a session.

use serde::{Deserialize, Serialize};

use super::{Email, UserId, UserRole};

/// Canonical in-memory record of the signed-in user.
///
/// Every backend payload shape is reduced to this one before anything else
/// in the client sees it. Field order is fixed, so two equal values always
/// serialize to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: UserId,
    pub email: Email,
    pub full_name: String,
    pub role: UserRole,
}

impl SessionUser {
    /// Whether the user may use owner features (list and manage cars).
    #[must_use]
    pub const fn is_owner(&self) -> bool {
        matches!(self.role, UserRole::Owner | UserRole::Admin)
    }

    /// Whether the user may review owner requests.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}
