use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::WalletPaths;
use crate::errors::{WalletError, WalletResult};

/// Key-value store for the small flags the front-end keeps locally.
///
/// Mirrors the browser's `localStorage` contract: string keys, string values,
/// synchronous access.
pub trait MarkerStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> WalletResult<()>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> WalletResult<()>;
}

/// Markers kept in memory only; forgotten when the process exits.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> WalletResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// One file per marker under the wallet's marker directory.
#[derive(Debug, Clone)]
pub struct FileMarkerStore {
    dir: PathBuf,
}

impl FileMarkerStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn from_paths(paths: &WalletPaths) -> Self {
        Self::new(paths.marker_dir())
    }

    fn path_for(&self, key: &str) -> WalletResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(WalletError::StorageError(format!(
                "Invalid marker key: {:?}",
                key
            )));
        }
        Ok(self.dir.join(key))
    }
}

impl MarkerStore for FileMarkerStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> WalletResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        // Keys never start with '.', so the staging name cannot clash with a key.
        let tmp_path = self.dir.join(format!(".{}.tmp", key));
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemoryMarkerStore::new();
        assert_eq!(store.get("walletConnected").unwrap(), None);
        store.set("walletConnected", "true").unwrap();
        assert_eq!(
            store.get("walletConnected").unwrap(),
            Some("true".to_string())
        );
        store.remove("walletConnected").unwrap();
        store.remove("walletConnected").unwrap();
        assert_eq!(store.get("walletConnected").unwrap(), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        FileMarkerStore::new(temp.path())
            .set("walletConnected", "true")
            .unwrap();

        let reopened = FileMarkerStore::new(temp.path());
        assert_eq!(
            reopened.get("walletConnected").unwrap(),
            Some("true".to_string())
        );
        reopened.remove("walletConnected").unwrap();
        assert!(!temp.path().join("walletConnected").exists());
    }

    #[test]
    fn dotted_keys_are_stored_independently() {
        let temp = TempDir::new().unwrap();
        let store = FileMarkerStore::new(temp.path());
        store.set("session.primary", "one").unwrap();
        store.set("session.backup", "two").unwrap();
        store.set("session", "three").unwrap();

        assert_eq!(store.get("session.primary").unwrap(), Some("one".to_string()));
        assert_eq!(store.get("session.backup").unwrap(), Some("two".to_string()));
        assert_eq!(store.get("session").unwrap(), Some("three".to_string()));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 3);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let temp = TempDir::new().unwrap();
        let store = FileMarkerStore::new(temp.path());
        for key in ["", "../escape", ".hidden", "a/b"] {
            assert!(matches!(
                store.set(key, "x"),
                Err(WalletError::StorageError(_))
            ));
        }
    }

    #[cfg(unix)]
    #[test]
    fn file_store_surfaces_write_failures() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let store = FileMarkerStore::new(&blocker);
        assert!(matches!(
            store.set("walletConnected", "true"),
            Err(WalletError::StorageError(_))
        ));
    }
}
