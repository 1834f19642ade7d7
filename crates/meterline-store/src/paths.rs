use std::path::{Path, PathBuf};

/// All well-known paths under `.meterline/`.
#[derive(Debug, Clone)]
pub struct MeterPaths {
    pub root: PathBuf,
    pub meter_dir: PathBuf,
    pub snapshots_dir: PathBuf,
    pub latest_json: PathBuf,
    pub rates_json: PathBuf,
    pub config_json: PathBuf,
    pub jobs_jsonl: PathBuf,
    pub lock_file: PathBuf,
}

impl MeterPaths {
    /// Derive all paths from a project root. Pure computation, no I/O.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let meter_dir = root.join(".meterline");
        let snapshots_dir = meter_dir.join("snapshots");
        Self {
            latest_json: snapshots_dir.join("latest.json"),
            rates_json: meter_dir.join("rates.json"),
            config_json: meter_dir.join("config.json"),
            jobs_jsonl: meter_dir.join("jobs.jsonl"),
            lock_file: meter_dir.join("LOCK"),
            snapshots_dir,
            meter_dir,
            root,
        }
    }

    /// Create all required directories. Idempotent.
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.snapshots_dir)
    }

    /// Check whether `.meterline/` exists.
    pub fn is_initialized(&self) -> bool {
        self.meter_dir.is_dir()
    }

    /// The rate table file in use: `rates.json`, else `rates.yaml`/`rates.yml`.
    /// Returns `None` when none exist.
    pub fn rates_file(&self) -> Option<PathBuf> {
        [
            self.rates_json.clone(),
            self.meter_dir.join("rates.yaml"),
            self.meter_dir.join("rates.yml"),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }

    /// Walk up from `start` looking for a directory containing `.meterline/`.
    /// Returns `None` if not found.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut cur = start.to_path_buf();
        loop {
            if cur.join(".meterline").is_dir() {
                return Some(cur);
            }
            if !cur.pop() {
                return None;
            }
        }
    }
}
