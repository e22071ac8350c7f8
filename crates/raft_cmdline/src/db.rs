use std::path::{Path, PathBuf};

use thiserror::Error;

pub const DB_EXTENSION: &str = ".raftdb";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbError {
    #[error("DB file [{}] does not exist", .0.display())]
    Missing(PathBuf),
}

/// Appends `.raftdb` unless the path already ends with it.
pub fn normalize(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    if !raw.to_string_lossy().ends_with(DB_EXTENSION) {
        raw.push(DB_EXTENSION);
    }
    PathBuf::from(raw)
}

/// Resolves the database path and refuses a missing file unless `create` is
/// set. Nothing is created here; persistence lives outside this tool.
pub fn check(path: &Path, create: bool) -> Result<PathBuf, DbError> {
    let path = normalize(path);
    if !create && !path.exists() {
        return Err(DbError::Missing(path));
    }
    Ok(path)
}
