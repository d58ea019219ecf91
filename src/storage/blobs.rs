use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::storage::StorageError;

/// Flat directory of uploaded files, addressed by server name.
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves `name` inside the store; names must be a single path component.
    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        let is_plain = !name.is_empty()
            && name != "."
            && name != ".."
            && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
        if !is_plain {
            return Err(StorageError::InvalidBlobName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }

    pub fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.path_for(name)?;
        Ok(path.exists())
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::BlobWriteFailed {
            path: self.dir.clone(),
            source: e,
        })?;
        fs::write(&path, bytes).map_err(|e| StorageError::BlobWriteFailed {
            path: path.clone(),
            source: e,
        })?;
        debug!(path = %path.display(), size = bytes.len(), "stored blob");
        Ok(path)
    }

    /// Removes a blob. Returns `false` if it was already gone.
    pub fn remove(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::BlobRemoveFailed { path, source: e }),
        }
    }
}
