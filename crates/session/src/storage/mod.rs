//! Persistent key-value slots backing the token and hint stores.
//!
//! Mirrors the browser's local storage contract: string keys, string values,
//! last write wins. Implementations must be safe to share between clones of
//! a session handle.

mod file;

use std::collections::HashMap;
use std::sync::Mutex;

pub use file::FileStorage;

use thiserror::Error;

/// Errors raised by a [`KeyValueStorage`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but is not a JSON object of strings.
    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// A previous writer panicked while holding the lock.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// A string-keyed persistent slot store.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("authToken").unwrap(), None);

        storage.set_item("authToken", "first").unwrap();
        storage.set_item("authToken", "second").unwrap();
        assert_eq!(
            storage.get_item("authToken").unwrap().as_deref(),
            Some("second")
        );

        storage.remove_item("authToken").unwrap();
        storage.remove_item("authToken").unwrap();
        assert_eq!(storage.get_item("authToken").unwrap(), None);
    }
}
