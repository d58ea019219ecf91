use std::{
    fs::{self, rename, write},
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::to_string_pretty;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::{Collection, CollectionLock, Storage, StorageError};

pub const DEFAULT_BACKUPS_KEPT: usize = 5;

/// One pretty-printed JSON array per collection, `<dir>/<collection>.json`.
pub struct JsonFileStorage {
    dir: PathBuf,
    backups_kept: usize,
}

impl JsonFileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            backups_kept: DEFAULT_BACKUPS_KEPT,
        }
    }

    pub fn with_backups_kept(mut self, backups_kept: usize) -> Self {
        self.backups_kept = backups_kept;
        self
    }

    pub fn document_path(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.name()))
    }

    fn lock_path(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.lock", collection.name()))
    }

    fn get_backup_dir(&self) -> PathBuf {
        self.dir.join("backups")
    }

    fn get_backup_path(&self, collection: Collection) -> PathBuf {
        let nanos = jiff::Timestamp::now().as_nanosecond();
        self.get_backup_dir()
            .join(format!("{}-{:020}.json", collection.name(), nanos))
    }

    /// Writes an empty array if the document does not exist yet.
    fn ensure_document(&self, path: &Path) -> std::io::Result<()> {
        if fs::exists(path)? {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        write(path, "[]")?;
        debug!(path = %path.display(), "created empty collection document");
        Ok(())
    }

    fn read_document<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StorageError> {
        let path = self.document_path(collection);
        self.ensure_document(&path)
            .map_err(|e| StorageError::ReadFailed {
                path: path.clone(),
                source: e,
            })?;
        let content = fs::read_to_string(&path).map_err(|e| StorageError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| StorageError::Corrupt { path, source: e })
    }

    fn snapshot(&self, collection: Collection) -> Result<(), StorageError> {
        if self.backups_kept == 0 {
            return Ok(());
        }
        self.create_backup(collection)?;
        self.cleanup_old_backups(collection)
    }

    fn create_backup(&self, collection: Collection) -> Result<(), StorageError> {
        let path = self.document_path(collection);
        let file_exists = fs::exists(&path).map_err(|e| StorageError::BackupFailed {
            path: path.clone(),
            source: e,
        })?;
        if !file_exists {
            return Ok(());
        }

        let backups_dir = self.get_backup_dir();
        fs::create_dir_all(&backups_dir).map_err(|e| StorageError::BackupFailed {
            path: backups_dir,
            source: e,
        })?;

        let backup_path = self.get_backup_path(collection);
        fs::copy(&path, &backup_path).map_err(|e| StorageError::BackupFailed {
            path: backup_path,
            source: e,
        })?;
        Ok(())
    }

    fn cleanup_old_backups(&self, collection: Collection) -> Result<(), StorageError> {
        let backup_dir = self.get_backup_dir();
        let backup_dir_exists =
            fs::exists(&backup_dir).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        if !backup_dir_exists {
            return Ok(());
        }

        let prefix = format!("{}-", collection.name());
        let mut file_entries = fs::read_dir(&backup_dir)
            .map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?
            .flatten()
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();

        file_entries.sort();

        let number_of_files_to_delete = file_entries.len().saturating_sub(self.backups_kept);

        for file_path in &file_entries[0..number_of_files_to_delete] {
            fs::remove_file(file_path).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        }

        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn lock(&self, collection: Collection) -> Result<CollectionLock, StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::LockFailed {
            path: self.dir.clone(),
            source: e,
        })?;
        CollectionLock::acquire(collection, self.lock_path(collection))
    }

    fn load<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        match self.read_document(collection) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "treating collection as empty");
                Vec::new()
            }
        }
    }

    fn load_locked<T: DeserializeOwned>(&self, lock: &CollectionLock) -> Result<Vec<T>, StorageError> {
        self.read_document(lock.collection())
    }

    fn save<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<(), StorageError> {
        let path = self.document_path(collection);
        let json =
            to_string_pretty(records).map_err(|e| StorageError::SerializeFailed { source: e })?;

        fs::create_dir_all(&self.dir).map_err(|e| StorageError::SaveFailed {
            path: self.dir.clone(),
            source: e,
        })?;

        let temp_path = PathBuf::from(format!("{}.tmp.{}", path.display(), Uuid::new_v4()));
        write(&temp_path, json).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        let replaced = self.snapshot(collection).and_then(|_| {
            rename(&temp_path, &path).map_err(|e| StorageError::SaveFailed {
                path: path.clone(),
                source: e,
            })
        });

        if replaced.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        replaced
    }
}
