use std::{fs::File, path::PathBuf};

use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub mod blobs;
pub mod json;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to lock '{path}': {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read collection from '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Collection document '{path}' is malformed, refusing to overwrite it: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to save collection to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize collection to JSON: {source}")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create backup at '{path}': {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to cleanup old backups in '{dir}': {source}")]
    CleanupFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write blob '{path}': {source}")]
    BlobWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove blob '{path}': {source}")]
    BlobRemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid blob name '{0}'")]
    InvalidBlobName(String),
}

/// The independent record collections, one document each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Projects,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Projects => "projects",
        }
    }
}

/// Exclusive hold on a collection. Released when dropped.
pub struct CollectionLock {
    collection: Collection,
    file: File,
}

impl CollectionLock {
    pub fn acquire(collection: Collection, path: PathBuf) -> Result<Self, StorageError> {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StorageError::LockFailed {
                path: path.clone(),
                source: e,
            })?;
        file.lock_exclusive()
            .map_err(|e| StorageError::LockFailed { path, source: e })?;
        Ok(Self { collection, file })
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }
}

impl Drop for CollectionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Load/save of whole collections.
///
/// `load` never fails: a missing or corrupt document reads as an empty
/// collection. Callers that mutate hold the lock returned by `lock` and read
/// through `load_locked`, which fails on a corrupt document so that it is
/// never saved over.
pub trait Storage {
    fn lock(&self, collection: Collection) -> Result<CollectionLock, StorageError>;
    fn load<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T>;
    fn load_locked<T: DeserializeOwned>(&self, lock: &CollectionLock) -> Result<Vec<T>, StorageError>;
    fn save<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<(), StorageError>;
}
