//! Core storage engine: sandboxed, atomic file I/O rooted at one directory.

use crate::builder::StorageBuilder;
use crate::collection::{Collection, CollectionName};
use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance;
use crate::security;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub(crate) const TMP_MARKER: &str = ".crmtmp.";

#[derive(Debug)]
pub(crate) struct StorageInner {
    /// Canonical physical root; every resolved path starts with it.
    pub(crate) root: PathBuf,
    pub(crate) tmp_counter: AtomicU64,
}

/// A thread-safe handle to the storage engine.
///
/// Cloning is cheap; all clones share the same root and temp counter.
#[derive(Debug, Clone)]
pub struct Storage {
    pub(crate) inner: Arc<StorageInner>,
}

impl Storage {
    #[must_use = "The storage engine is not initialized until you call .connect()"]
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    /// Canonical root directory of this store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Returns a view scoped to the named collection directory.
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidCollection`] if the name is empty or
    /// contains characters other than ASCII alphanumerics, `_` and `-`.
    pub fn collection<N>(&self, name: N) -> Result<Collection, StorageError>
    where
        N: TryInto<CollectionName, Error = StorageError>,
    {
        Ok(Collection::new(self.clone(), name.try_into()?))
    }

    /// Resolves a relative path inside the sandbox.
    ///
    /// # Errors
    /// Returns [`StorageError::PathTraversalAttempt`] if the path escapes the root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
        security::resolve_path(&self.inner.root, path)
    }

    pub(crate) fn resolve_in(
        &self,
        base: Option<&str>,
        path: impl AsRef<Path>,
    ) -> Result<PathBuf, StorageError> {
        match base {
            Some(base) => security::resolve_path(&self.inner.root, Path::new(base).join(path)),
            None => self.resolve(path),
        }
    }

    /// Reads a whole file.
    ///
    /// # Errors
    /// Returns [`StorageError::FileNotFound`] if the path does not exist.
    pub async fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, StorageError> {
        self.read_in(None, path).await
    }

    pub(crate) async fn read_in(
        &self,
        base: Option<&str>,
        path: impl AsRef<Path>,
    ) -> Result<Vec<u8>, StorageError> {
        let resolved = self.resolve_in(base, path)?;

        match fs::read(&resolved).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::FileNotFound {
                message: resolved.display().to_string().into(),
                context: None,
            }),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Read failed: {}", resolved.display()).into()),
            }),
        }
    }

    /// Writes a file atomically: unique temp file, `fsync`, then `rename`.
    ///
    /// Parent directories are created on demand.
    ///
    /// # Errors
    /// Returns [`StorageError::PathTraversalAttempt`] if the path escapes the sandbox,
    /// or [`StorageError::Io`] on disk failures.
    pub async fn write(&self, path: impl AsRef<Path>, data: &[u8]) -> Result<(), StorageError> {
        self.write_in(None, path, data).await
    }

    pub(crate) async fn write_in(
        &self,
        base: Option<&str>,
        path: impl AsRef<Path>,
        data: &[u8],
    ) -> Result<(), StorageError> {
        let resolved = self.resolve_in(base, path)?;

        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create parent of {}", resolved.display()))?;
        }

        let temp = unique_tmp_path(&resolved, &self.inner.tmp_counter);
        {
            let mut file = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&temp)
                .await
                .context(format!("Temp creation failed: {}", temp.display()))?;
            file.write_all(data).await.context("Write failed")?;
            file.sync_all().await.context("Hardware sync failed")?;
        }

        if let Err(err) = fs::rename(&temp, &resolved).await {
            if err.kind() != ErrorKind::AlreadyExists {
                let _ = fs::remove_file(&temp).await;
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Atomic swap failed: {}", resolved.display()).into()),
                });
            }
            fs::remove_file(&resolved)
                .await
                .context(format!("Failed to replace existing file: {}", resolved.display()))?;
            fs::rename(&temp, &resolved)
                .await
                .context(format!("Atomic swap failed: {}", resolved.display()))?;
        }

        if let Some(parent) = resolved.parent() {
            sync_dir(parent).await;
        }

        debug!(path = %resolved.display(), bytes = data.len(), "File saved atomically");
        Ok(())
    }

    /// Deletes a file.
    ///
    /// # Errors
    /// Returns [`StorageError::FileNotFound`] if it does not exist.
    pub async fn delete(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        self.delete_in(None, path).await
    }

    pub(crate) async fn delete_in(
        &self,
        base: Option<&str>,
        path: impl AsRef<Path>,
    ) -> Result<(), StorageError> {
        let resolved = self.resolve_in(base, path)?;
        match fs::remove_file(&resolved).await {
            Ok(()) => {
                debug!(path = %resolved.display(), "File deleted");
                Ok(())
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::FileNotFound {
                message: resolved.display().to_string().into(),
                context: None,
            }),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Failed to delete: {}", resolved.display()).into()),
            }),
        }
    }

    /// Checks whether a file exists inside the sandbox.
    ///
    /// # Errors
    /// Fails only when the path itself is rejected by the sandbox.
    pub fn exists(&self, path: impl AsRef<Path>) -> Result<bool, StorageError> {
        Ok(self.resolve(path)?.is_file())
    }

    /// Lists file stems directly under `base` that carry `extension`, sorted.
    pub(crate) async fn keys_in(
        &self,
        base: &str,
        extension: &str,
    ) -> Result<Vec<String>, StorageError> {
        let dir = self.resolve(base)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to list: {}", dir.display()).into()),
                });
            },
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("Directory scan failed")? {
            let path = entry.path();
            let is_match = path.extension().and_then(|e| e.to_str()) == Some(extension);
            if is_match
                && path.is_file()
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && !stem.contains(TMP_MARKER)
            {
                keys.push(stem.to_owned());
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }

    /// Removes temporary files left behind by interrupted writes.
    pub async fn purge_tmp(&self) {
        maintenance::purge_tmp(&self.inner.root).await;
    }
}

async fn sync_dir(path: &Path) {
    match fs::File::open(path).await {
        Ok(dir) => {
            if let Err(err) = dir.sync_all().await {
                warn!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => warn!(path = %path.display(), error = %err, "Directory open failed"),
    }
}

fn unique_tmp_path(target: &Path, counter: &AtomicU64) -> PathBuf {
    let counter = counter.fetch_add(1, Ordering::Relaxed);
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("record");
    target.with_file_name(format!("{file_name}{TMP_MARKER}{counter}"))
}
