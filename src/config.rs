use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 25;

/// Resolved runtime settings for the server.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind: SocketAddr,
    pub max_upload_bytes: usize,
    pub backups_kept: usize,
}

impl Config {
    pub fn uploads_dir(&self) -> PathBuf {
        uploads_dir(&self.data_dir)
    }

    /// Creates the data and uploads directories.
    pub fn prepare_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.uploads_dir())
    }
}

pub fn uploads_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("uploads")
}

/// `--data-dir` when given, else `<local data dir>/tablero`.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        dirs::data_local_dir()
            .map(|dir| dir.join("tablero"))
            .unwrap_or_else(|| PathBuf::from("./tablero-data"))
    })
}

pub fn megabytes(mb: usize) -> usize {
    mb.saturating_mul(1024 * 1024)
}
