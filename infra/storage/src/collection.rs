use crate::engine::Storage;
use crate::error::StorageError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Validated collection directory name: lowercase ASCII alphanumerics, `_` or `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionName(String);

impl TryFrom<&str> for CollectionName {
    type Error = StorageError;

    fn try_from(value: &str) -> Result<Self, StorageError> {
        let name = value.trim().to_ascii_lowercase();

        if name.is_empty() {
            return Err(StorageError::InvalidCollection {
                message: "EMPTY".into(),
                context: Some("Collection name cannot be empty".into()),
            });
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(StorageError::InvalidCollection {
                message: name.into(),
                context: Some("Collection name contains illegal characters".into()),
            });
        }

        Ok(Self(name))
    }
}

impl TryFrom<String> for CollectionName {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, StorageError> {
        Self::try_from(value.as_str())
    }
}

impl TryFrom<&String> for CollectionName {
    type Error = StorageError;

    fn try_from(value: &String) -> Result<Self, StorageError> {
        Self::try_from(value.as_str())
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directory of records inside a [`Storage`] root.
///
/// All paths are relative to `<root>/<collection>/` and share the parent
/// store's sandbox and atomic write path.
#[derive(Debug, Clone)]
pub struct Collection {
    storage: Storage,
    name: Arc<CollectionName>,
}

impl Collection {
    pub(crate) fn new(storage: Storage, name: CollectionName) -> Self {
        Self { storage, name: Arc::new(name) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name.0
    }

    /// Resolves a record path to its physical location.
    ///
    /// # Errors
    /// Returns [`StorageError::PathTraversalAttempt`] if the path escapes the sandbox.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
        self.storage.resolve_in(Some(self.name()), path)
    }

    /// Reads a record file.
    ///
    /// # Errors
    /// Returns [`StorageError::FileNotFound`] if the record does not exist.
    pub async fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, StorageError> {
        self.storage.read_in(Some(self.name()), path).await
    }

    /// Writes a record file atomically.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] on disk failures.
    pub async fn write(&self, path: impl AsRef<Path>, data: &[u8]) -> Result<(), StorageError> {
        self.storage.write_in(Some(self.name()), path, data).await
    }

    /// Deletes a record file.
    ///
    /// # Errors
    /// Returns [`StorageError::FileNotFound`] if the record does not exist.
    pub async fn delete(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        self.storage.delete_in(Some(self.name()), path).await
    }

    /// # Errors
    /// Fails only when the path is rejected by the sandbox.
    pub fn exists(&self, path: impl AsRef<Path>) -> Result<bool, StorageError> {
        Ok(self.resolve(path)?.is_file())
    }

    /// Sorted stems of every record carrying `extension` (e.g. `"json"`).
    ///
    /// A collection that was never written to yields an empty list.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] if the directory cannot be scanned.
    pub async fn keys(&self, extension: &str) -> Result<Vec<String>, StorageError> {
        self.storage.keys_in(self.name(), extension).await
    }
}
