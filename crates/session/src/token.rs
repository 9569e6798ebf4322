//! Credential and cached-user persistence.
//!
//! Two fixed slots in the same [`KeyValueStorage`]:
//! - `authToken` - the bearer credential ([`TokenStore`])
//! - `user` - a snapshot of the last confirmed user ([`UserHintStore`])

use std::sync::Arc;

use chrono::{DateTime, Utc};
use minefornow_core::SessionUser;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStorage, StorageError};

/// Storage key for the bearer credential.
pub const TOKEN_KEY: &str = "authToken";

/// Storage key for the cached user snapshot.
pub const USER_HINT_KEY: &str = "user";

/// Persistent slot for the bearer credential.
///
/// The token is opaque: nothing here inspects or validates it.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl TokenStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// The stored credential, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub fn get(&self) -> Result<Option<SecretString>, StorageError> {
        Ok(self
            .storage
            .get_item(TOKEN_KEY)?
            .filter(|token| !token.is_empty())
            .map(SecretString::from))
    }

    /// Persist `token`, overwriting any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub fn set(&self, token: &SecretString) -> Result<(), StorageError> {
        self.storage.set_item(TOKEN_KEY, token.expose_secret())
    }

    /// Remove the stored credential.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(TOKEN_KEY)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

/// A cached user snapshot that the server has not re-confirmed.
///
/// Good for painting a name in a header before `refresh()` returns. Never
/// treat it as proof of authentication or of the user's current role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHint {
    pub user: SessionUser,
    pub cached_at: DateTime<Utc>,
}

/// Persistent slot for the [`UserHint`].
#[derive(Clone)]
pub struct UserHintStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl UserHintStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// The cached snapshot. An unreadable value counts as absent.
    #[must_use]
    pub fn get(&self) -> Option<UserHint> {
        let raw = match self.storage.get_item(USER_HINT_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cached user");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(hint) => Some(hint),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring undecodable cached user");
                None
            }
        }
    }

    /// Cache `user`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be encoded or written.
    pub fn set(&self, user: &SessionUser) -> Result<(), StorageError> {
        let hint = UserHint {
            user: user.clone(),
            cached_at: Utc::now(),
        };
        self.storage
            .set_item(USER_HINT_KEY, &serde_json::to_string(&hint)?)
    }

    /// Drop the cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(USER_HINT_KEY)
    }
}

impl std::fmt::Debug for UserHintStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserHintStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use minefornow_core::{Email, UserId, UserRole};

    use super::*;
    use crate::storage::MemoryStorage;

    fn storage() -> Arc<dyn KeyValueStorage> {
        Arc::new(MemoryStorage::new())
    }

    #[test]
    fn test_token_store_roundtrip() {
        let tokens = TokenStore::new(storage());
        assert!(tokens.get().unwrap().is_none());

        tokens.set(&SecretString::from("jwt-1")).unwrap();
        tokens.set(&SecretString::from("jwt-2")).unwrap();
        assert_eq!(tokens.get().unwrap().unwrap().expose_secret(), "jwt-2");

        tokens.clear().unwrap();
        assert!(tokens.get().unwrap().is_none());
    }

    #[test]
    fn test_empty_token_counts_as_absent() {
        let storage = storage();
        storage.set_item(TOKEN_KEY, "").unwrap();
        assert!(TokenStore::new(storage).get().unwrap().is_none());
    }

    #[test]
    fn test_hint_store_roundtrip_and_clear() {
        let storage = storage();
        let hints = UserHintStore::new(Arc::clone(&storage));
        let user = SessionUser {
            id: UserId::new(4),
            email: Email::parse("rui@example.com").unwrap(),
            full_name: "Rui Costa".to_string(),
            role: UserRole::Owner,
        };

        hints.set(&user).unwrap();
        assert_eq!(hints.get().unwrap().user, user);

        hints.clear().unwrap();
        assert!(hints.get().is_none());
        assert!(storage.get_item(USER_HINT_KEY).unwrap().is_none());
    }

    #[test]
    fn test_hint_store_ignores_legacy_shapes() {
        let storage = storage();
        storage
            .set_item(USER_HINT_KEY, r#"{"email":"x@example.com","user_role":"RENTER"}"#)
            .unwrap();
        assert!(UserHintStore::new(storage).get().is_none());
    }

    #[test]
    fn test_token_store_debug_hides_contents() {
        let tokens = TokenStore::new(storage());
        tokens.set(&SecretString::from("very-secret-jwt")).unwrap();
        assert!(!format!("{tokens:?}").contains("very-secret-jwt"));
    }
}
