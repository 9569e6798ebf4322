//! JSON file storage.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{KeyValueStorage, StorageError};

/// Storage persisted as a single JSON object on disk.
///
/// Every read goes to the file, so two handles on the same path (or a second
/// process) see each other's writes. Writes go to a sibling temporary file
/// that is renamed over the target; on unix it is readable by the owner only.
///
/// A file that no longer parses fails reads, but the next write replaces it,
/// so clearing a credential always succeeds.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Open storage at `path`. The file and its parent directory are created
    /// on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = create_private(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(items)?)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let (mut items, discarded) = match self.load() {
            Ok(items) => (items, false),
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Replacing unreadable storage file"
                );
                (BTreeMap::new(), true)
            }
            Err(e) => return Err(e),
        };
        if f(&mut items) || discarded {
            self.store(&items)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies to newly created files
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<File> {
    File::create(path)
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.insert(key.to_owned(), value.to_owned());
            true
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.update(|items| items.remove(key).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn scratch() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        (dir, path)
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let (_dir, path) = scratch();
        let storage = FileStorage::new(path);
        assert_eq!(storage.get_item("authToken").unwrap(), None);
        storage.remove_item("authToken").unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_values_survive_reopen() {
        let (_dir, path) = scratch();
        FileStorage::new(&path).set_item("authToken", "jwt-abc").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.get_item("authToken").unwrap().as_deref(),
            Some("jwt-abc")
        );

        reopened.remove_item("authToken").unwrap();
        assert_eq!(FileStorage::new(&path).get_item("authToken").unwrap(), None);
    }

    #[test]
    fn test_keys_are_independent() {
        let (_dir, path) = scratch();
        let storage = FileStorage::new(path);
        storage.set_item("authToken", "t").unwrap();
        storage.set_item("user", "{}").unwrap();
        storage.remove_item("user").unwrap();
        assert_eq!(storage.get_item("authToken").unwrap().as_deref(), Some("t"));
    }

    #[test]
    fn test_corrupt_file_fails_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.get_item("authToken"),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn test_remove_replaces_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "garbage").unwrap();

        let storage = FileStorage::new(&path);
        storage.remove_item("authToken").unwrap();
        assert_eq!(storage.get_item("authToken").unwrap(), None);

        storage.set_item("authToken", "jwt-new").unwrap();
        assert_eq!(
            storage.get_item("authToken").unwrap().as_deref(),
            Some("jwt-new")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, path) = scratch();
        FileStorage::new(&path).set_item("authToken", "jwt-abc").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
