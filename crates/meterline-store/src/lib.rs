pub mod lock;
pub mod paths;
pub mod snapshot;

pub use lock::WorkspaceLock;
pub use paths::MeterPaths;
pub use snapshot::{Snapshot, SnapshotKey, SnapshotStore};

use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode or decode snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot key already exists: {0}")]
    KeyCollision(String),
    #[error("invalid snapshot key: {0:?}")]
    InvalidKey(String),
    #[error("snapshot {key} is corrupt: digest mismatch")]
    Corrupt { key: String },
    #[error("report has a non-finite value in {field}; refusing to persist")]
    NonFinite { field: String },
    #[error("workspace is locked by another process ({0})")]
    Locked(String),
}

fn temp_in(path: &Path) -> Result<tempfile::NamedTempFile, StoreError> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no parent dir for {}", path.display()),
        )
    })?;
    fs::create_dir_all(parent)?;
    Ok(tempfile::NamedTempFile::new_in(parent)?)
}

/// Atomic write: write to temp file in same dir, then rename over `path`.
/// Readers see either the old or the new content, never a mix.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut tmp = temp_in(path)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Like [`write_atomic`] but refuses to replace an existing file.
/// Returns `Err(Io)` with kind `AlreadyExists` when `path` is taken.
pub fn write_new(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut tmp = temp_in(path)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist_noclobber(path)
        .map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_and_replaces() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("test.txt");
        write_atomic(&path, b"hello world").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello world");
        write_atomic(&path, b"bye").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "bye");
    }

    #[test]
    fn write_atomic_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.json");
        for i in 0..5 {
            write_atomic(&path, format!("{i}").as_bytes()).unwrap();
        }
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_new_refuses_to_clobber() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("once.json");
        write_new(&path, b"first").unwrap();
        let err = write_new(&path, b"second").unwrap_err();
        match err {
            StoreError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");
    }
}
