//! Immutable report snapshots plus a `latest.json` alias.
//!
//! Layout under `.meterline/snapshots/`:
//!
//! ```text
//! report-20260218T100000Z.json            one file per recomputation, never rewritten
//! report-20260218T100000Z-000000042.json  nanosecond key, used after a collision
//! latest.json                             atomically replaced copy of the newest write
//! ```
//!
//! Every file holds an envelope with the report and the SHA-256 of its JSON
//! encoding, checked on read.

use crate::paths::MeterPaths;
use crate::{write_atomic, write_new, StoreError};
use meterline_core::hash::json_digest;
use meterline_core::{Report, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::UtcOffset;

const KEY_PREFIX: &str = "report-";
const LATEST_FILE: &str = "latest.json";

/// Opaque, filesystem-safe identifier of one persisted snapshot.
/// Keys sort chronologically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotKey(String);

impl SnapshotKey {
    /// Second-precision key, e.g. `report-20260218T100000Z`.
    pub fn from_time(t: Timestamp) -> Self {
        let t = t.to_offset(UtcOffset::UTC);
        Self(format!(
            "{KEY_PREFIX}{:04}{:02}{:02}T{:02}{:02}{:02}Z",
            t.year(),
            u8::from(t.month()),
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        ))
    }

    /// Nanosecond-precision key for retrying after [`StoreError::KeyCollision`].
    pub fn fine(t: Timestamp) -> Self {
        let base = Self::from_time(t);
        Self(format!("{}-{:09}", base.0, t.nanosecond()))
    }

    /// Validate a user-supplied key.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let ok = s.starts_with(KEY_PREFIX)
            && s.len() > KEY_PREFIX.len()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if ok {
            Ok(Self(s.to_string()))
        } else {
            Err(StoreError::InvalidKey(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A report together with the key it was stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub key: SnapshotKey,
    pub digest: String,
    pub report: Report,
}

/// Filesystem-backed snapshot history with an atomically replaced latest alias.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open(paths: &MeterPaths) -> Self {
        Self::new(paths.snapshots_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &SnapshotKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE)
    }

    /// Persist under a key derived from `report.generated_at` (second
    /// precision). Two reports generated in the same second collide; the
    /// caller retries with [`persist_as`](Self::persist_as) and
    /// [`SnapshotKey::fine`].
    pub fn persist(&self, report: &Report) -> Result<SnapshotKey, StoreError> {
        self.persist_as(report, SnapshotKey::from_time(report.generated_at))
    }

    /// Write the immutable snapshot file, then replace `latest.json`.
    pub fn persist_as(
        &self,
        report: &Report,
        key: SnapshotKey,
    ) -> Result<SnapshotKey, StoreError> {
        check_finite(report)?;
        let snapshot = Snapshot {
            digest: json_digest(report)?,
            key,
            report: report.clone(),
        };
        let data = serde_json::to_vec_pretty(&snapshot)?;

        let path = self.path_for(&snapshot.key);
        match write_new(&path, &data) {
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::KeyCollision(snapshot.key.to_string()));
            }
            other => other?,
        }
        write_atomic(&self.latest_path(), &data)?;

        tracing::info!(
            key = %snapshot.key,
            total = report.total_points,
            jobs = report.job_count,
            "snapshot persisted"
        );
        Ok(snapshot.key)
    }

    /// The most recently persisted report, if any.
    pub fn latest(&self) -> Result<Option<Report>, StoreError> {
        Ok(self.latest_snapshot()?.map(|s| s.report))
    }

    pub fn latest_snapshot(&self) -> Result<Option<Snapshot>, StoreError> {
        read_snapshot(&self.latest_path())
    }

    pub fn get(&self, key: &SnapshotKey) -> Result<Option<Report>, StoreError> {
        Ok(read_snapshot(&self.path_for(key))?.map(|s| s.report))
    }

    /// All snapshot keys, oldest first.
    pub fn list(&self) -> Result<Vec<SnapshotKey>, StoreError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Ok(key) = SnapshotKey::parse(stem) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// JSON has no encoding for NaN or infinity, so such a report would be
/// written as `null` and never decode again.
fn check_finite(report: &Report) -> Result<(), StoreError> {
    let bad = |field: String| Err(StoreError::NonFinite { field });
    if !report.total_points.is_finite() {
        return bad("total_points".into());
    }
    if let Some((class, _)) = report.by_class.iter().find(|(_, v)| !v.is_finite()) {
        return bad(format!("by_class[{class}]"));
    }
    if let Some(i) = report
        .timeline
        .iter()
        .position(|p| !p.cumulative_total.is_finite())
    {
        return bad(format!("timeline[{i}]"));
    }
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let snapshot: Snapshot = serde_json::from_str(&content)?;
    if json_digest(&snapshot.report)? != snapshot.digest {
        return Err(StoreError::Corrupt {
            key: snapshot.key.to_string(),
        });
    }
    Ok(Some(snapshot))
}
