//! Key/value storage with browser local-storage semantics.
//!
//! Values are opaque strings (usually JSON). Reads of a missing key return
//! `None`; writes replace the whole value. Two backends are provided:
//!
//! - [`MemoryStorage`] - process-local map, used by tests
//! - [`FileStorage`] - a single JSON object file, read-modify-write per call
//!
//! Neither backend locks across processes; concurrent writers race and the
//! last write wins.
//!
//! A corrupt store file fails reads with [`StorageError::Corrupt`]. The next
//! write moves it aside to `<file>.corrupt` and starts from an empty object.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

/// Well-known storage keys.
pub mod keys {
    /// Primary cart mapping.
    pub const CART: &str = "cart";

    /// Mirror of the cart, used for recovery.
    pub const BACKUP_CART: &str = "backup_cart";

    /// Onboarding flag set once a guest count was chosen.
    pub const HAS_SELECTED_GUESTS: &str = "hasSelectedGuests";

    /// Number of diners chosen during onboarding.
    pub const GUEST_COUNT: &str = "guestCount";
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of strings.
    #[error("storage file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized.
    #[error("failed to serialize value for key {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// String key/value store.
pub trait Storage {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;

    /// Read and deserialize a JSON value.
    ///
    /// Missing keys and values that fail to parse both yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend cannot be read.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key, error = %e, "Ignoring unparseable stored value");
                Ok(None)
            }
        }
    }

    /// Serialize a value as JSON and store it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend write fails.
    fn set_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.set(key, &raw)
    }
}

// =============================================================================
// MemoryStorage
// =============================================================================

/// In-memory storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: BTreeMap<String, String>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value, for tests and fixtures.
    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }
}

// =============================================================================
// FileStorage
// =============================================================================

/// Storage persisted as a single JSON object file.
///
/// Every call re-reads the file so that separate processes (e.g. successive
/// CLI invocations) observe each other's writes. Writes go to a sibling
/// temporary file which is then renamed over the original.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Where a corrupt store file is moved before it is rebuilt.
    #[must_use]
    pub fn corrupt_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    /// Load the current values for a read-modify-write. The flag is set when
    /// a corrupt file was moved aside.
    fn load_for_write(&self) -> Result<(BTreeMap<String, String>, bool), StorageError> {
        match self.load() {
            Err(StorageError::Corrupt { source, .. }) => {
                let aside = self.corrupt_path();
                warn!(
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    error = %source,
                    "Storage file is corrupt, starting from an empty store"
                );
                std::fs::rename(&self.path, &aside).map_err(|e| self.io_error(e))?;
                Ok((BTreeMap::new(), true))
            }
            other => other.map(|values| (values, false)),
        }
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let raw = serde_json::to_string_pretty(values).map_err(|source| {
            StorageError::Serialize {
                key: "*".to_string(),
                source,
            }
        })?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let (mut values, _) = self.load_for_write()?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let (mut values, recovered) = self.load_for_write()?;
        if values.remove(key).is_some() || recovered {
            self.persist(&values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("snap-menu-storage-{}-{name}", std::process::id()))
            .join("storage.json")
    }

    #[test]
    fn test_memory_storage_roundtrip() {
        let mut storage = MemoryStorage::new();
        storage.set("a", "1").unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("1"));
        storage.remove("a").unwrap();
        assert_eq!(storage.get("a").unwrap(), None);
    }

    #[test]
    fn test_get_json_ignores_garbage() {
        let storage = MemoryStorage::new().with("n", "{not json");
        let value: Option<u32> = storage.get_json("n").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_file_storage_missing_file_is_empty() {
        let storage = FileStorage::new(temp_path("missing"));
        assert_eq!(storage.get(keys::CART).unwrap(), None);
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let path = temp_path("persist");
        let mut first = FileStorage::new(&path);
        first.set(keys::CART, "{}").unwrap();
        first.set(keys::GUEST_COUNT, "4").unwrap();

        let second = FileStorage::new(&path);
        assert_eq!(second.get(keys::GUEST_COUNT).unwrap().as_deref(), Some("4"));

        let mut third = FileStorage::new(&path);
        third.remove(keys::GUEST_COUNT).unwrap();
        assert_eq!(first.get(keys::GUEST_COUNT).unwrap(), None);
        assert_eq!(first.get(keys::CART).unwrap().as_deref(), Some("{}"));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_file_storage_reports_corrupt_file() {
        let path = temp_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[1, 2").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.get(keys::CART),
            Err(StorageError::Corrupt { .. })
        ));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_write_recovers_corrupt_file() {
        let path = temp_path("rebuild");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"cart": "{\"7\""#).unwrap();

        let mut storage = FileStorage::new(&path);
        assert!(storage.get(keys::CART).is_err());

        storage.set(keys::GUEST_COUNT, "2").unwrap();
        assert_eq!(storage.get(keys::GUEST_COUNT).unwrap().as_deref(), Some("2"));
        assert_eq!(storage.get(keys::CART).unwrap(), None);

        let aside = std::fs::read_to_string(storage.corrupt_path()).unwrap();
        assert!(aside.starts_with(r#"{"cart""#));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_remove_recovers_corrupt_file() {
        let path = temp_path("remove-corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[1, 2").unwrap();

        let mut storage = FileStorage::new(&path);
        storage.remove(keys::CART).unwrap();
        assert_eq!(storage.get(keys::CART).unwrap(), None);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
