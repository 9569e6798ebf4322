//! Marketplace user roles.

use serde::{Deserialize, Serialize};

/// Error returned when a role string matches none of the known roles.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid user role: {0:?}")]
pub struct RoleParseError(pub String);

/// Role of a marketplace user.
///
/// The set is closed. Serialized in `SCREAMING_SNAKE_CASE`, which is what the
/// API emits for the canonical shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Rents cars. Every account starts here.
    Renter,
    /// Renter whose owner upgrade request is waiting for admin review.
    PendingOwner,
    /// Lists and manages cars.
    Owner,
    /// Reviews owner requests; has every owner capability.
    Admin,
}

impl UserRole {
    /// All roles, lowest privilege first.
    pub const ALL: [Self; 4] = [Self::Renter, Self::PendingOwner, Self::Owner, Self::Admin];

    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Renter => "RENTER",
            Self::PendingOwner => "PENDING_OWNER",
            Self::Owner => "OWNER",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = RoleParseError;

    /// Case-insensitive; `-` and ` ` are treated like `_`.
    ///
    /// Also accepts `rental`, the name early API versions used for renters.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        match key.as_str() {
            "RENTER" | "RENTAL" => Ok(Self::Renter),
            "PENDING_OWNER" | "PENDINGOWNER" => Ok(Self::PendingOwner),
            "OWNER" => Ok(Self::Owner),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
    }

    #[test]
    fn test_parse_legacy_spellings() {
        assert_eq!("owner".parse::<UserRole>().unwrap(), UserRole::Owner);
        assert_eq!("rental".parse::<UserRole>().unwrap(), UserRole::Renter);
        assert_eq!(
            "pending-owner".parse::<UserRole>().unwrap(),
            UserRole::PendingOwner
        );
        assert_eq!(" Admin ".parse::<UserRole>().unwrap(), UserRole::Admin);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            "superuser".parse::<UserRole>(),
            Err(RoleParseError("superuser".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&UserRole::PendingOwner).unwrap();
        assert_eq!(json, "\"PENDING_OWNER\"");
    }
}
