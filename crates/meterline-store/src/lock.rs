use crate::paths::MeterPaths;
use crate::StoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};

/// Exclusive workspace lock backed by `.meterline/LOCK`.
/// Automatically released when dropped.
pub struct WorkspaceLock {
    _file: File,
}

impl WorkspaceLock {
    /// Try to acquire the workspace lock (non-blocking).
    /// Returns [`StoreError::Locked`] if another process holds it.
    pub fn acquire(paths: &MeterPaths) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&paths.meter_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&paths.lock_file)?;

        file.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(paths.lock_file.display().to_string()))?;

        Ok(Self { _file: file })
    }
}
