use anyhow::Context;
use meterline_core::source::read_jobs_jsonl;
use meterline_core::timestamp::parse_timestamp;
use meterline_core::{Intake, RateTable, Report, Timestamp};
use meterline_store::{MeterPaths, SnapshotKey, SnapshotStore, StoreError};
use meterline_sweep::{recompute, SweepOptions};
use std::path::{Path, PathBuf};

/// Per-invocation overrides from global CLI flags.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub jobs: Option<PathBuf>,
    pub rates: Option<PathBuf>,
}

/// A discovered `.meterline/` workspace plus its config.
pub struct Workspace {
    pub paths: MeterPaths,
    config: serde_json::Map<String, serde_json::Value>,
    overrides: Overrides,
}

impl Workspace {
    /// Find the workspace enclosing `cwd`. Errors if none exists.
    pub fn open(cwd: &Path, overrides: Overrides) -> anyhow::Result<Self> {
        let root = MeterPaths::find_root(cwd).ok_or_else(|| {
            anyhow::anyhow!("No .meterline/ workspace found. Run `meterline init` first.")
        })?;
        let paths = MeterPaths::discover(root);
        let config = read_config(&paths.config_json)?;
        Ok(Self {
            paths,
            config,
            overrides,
        })
    }

    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::open(&self.paths)
    }

    /// Rate table from `--rates`, else `.meterline/rates.{json,yaml,yml}`,
    /// else the built-in default.
    pub fn rates(&self) -> anyhow::Result<RateTable> {
        let path = self
            .overrides
            .rates
            .clone()
            .or_else(|| self.paths.rates_file());
        match path {
            Some(p) => {
                RateTable::load(&p).with_context(|| format!("loading rates: {}", p.display()))
            }
            None => {
                tracing::warn!("no rate table found, every class uses the default rate");
                Ok(RateTable::default())
            }
        }
    }

    /// `--jobs`, else config `jobs_path` (relative to the project root), else
    /// `.meterline/jobs.jsonl`.
    pub fn jobs_path(&self) -> PathBuf {
        if let Some(p) = &self.overrides.jobs {
            return p.clone();
        }
        match self.config.get("jobs_path").and_then(|v| v.as_str()) {
            Some(p) => self.paths.root.join(p),
            None => self.paths.jobs_jsonl.clone(),
        }
    }

    pub fn project_start(&self) -> anyhow::Result<Option<Timestamp>> {
        match self.config.get("project_start").and_then(|v| v.as_str()) {
            None => Ok(None),
            Some(s) => parse_timestamp(s)
                .map(Some)
                .ok_or_else(|| anyhow::anyhow!("config project_start is not a timestamp: {s}")),
        }
    }

    pub fn intake(&self) -> anyhow::Result<Intake> {
        let path = self.jobs_path();
        read_jobs_jsonl(&path).with_context(|| format!("reading jobs: {}", path.display()))
    }

    /// Full batch rebuild from every known job record.
    pub fn compute(&self, as_of: Option<Timestamp>) -> anyhow::Result<Report> {
        let rates = self.rates()?;
        let intake = self.intake()?;
        let opts = SweepOptions {
            as_of,
            project_start: self.project_start()?,
        };
        Ok(recompute(&intake, &rates, opts))
    }
}

/// Persist a report, retrying once with a nanosecond key when another
/// report already claimed the same second.
pub fn persist_report(store: &SnapshotStore, report: &Report) -> Result<SnapshotKey, StoreError> {
    match store.persist(report) {
        Err(StoreError::KeyCollision(key)) => {
            tracing::debug!(%key, "snapshot key taken, retrying with fine-grained key");
            store.persist_as(report, SnapshotKey::fine(report.generated_at))
        }
        other => other,
    }
}

/// Read config from `.meterline/config.json`. Returns empty map if file doesn't exist.
pub fn read_config(path: &Path) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    if !path.exists() {
        return Ok(serde_json::Map::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    let val: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing config: {}", path.display()))?;
    match val {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(dir: &Path) -> MeterPaths {
        let paths = MeterPaths::discover(dir);
        paths.ensure_layout().unwrap();
        paths
    }

    const JOBS: &str = r#"{"id":"1","resource_class":"gpu-4x","start_time":"2026-02-18T10:00:00Z","end_time":"2026-02-18T10:30:00Z","status":"completed"}
{"id":"2","resource_class":"cpu-2x","start_time":"2026-02-18T10:15:00Z","end_time":"2026-02-18T10:40:00Z","status":"completed"}
"#;

    const RATES: &str = r#"{"classes":{
        "gpu-4x":{"unit_count":4,"rate_per_unit_per_second":0.007},
        "cpu-2x":{"unit_count":2,"rate_per_unit_per_second":0.014}}}"#;

    #[test]
    fn open_without_workspace_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Workspace::open(tmp.path(), Overrides::default()).is_err());
    }

    #[test]
    fn compute_reads_jobs_and_rates() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = init(tmp.path());
        std::fs::write(&paths.jobs_jsonl, JOBS).unwrap();
        std::fs::write(&paths.rates_json, RATES).unwrap();

        let ws = Workspace::open(tmp.path(), Overrides::default()).unwrap();
        let as_of = parse_timestamp("2026-02-18T12:00:00Z").unwrap();
        let report = ws.compute(Some(as_of)).unwrap();
        assert!((report.total_points - 92.4).abs() < 1e-9);
        assert_eq!(report.job_count, 2);
    }

    #[test]
    fn config_jobs_path_and_project_start() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = init(tmp.path());
        std::fs::write(tmp.path().join("alt.jsonl"), JOBS).unwrap();
        std::fs::write(
            &paths.config_json,
            r#"{"jobs_path":"alt.jsonl","project_start":"2026-02-18T00:00:00Z"}"#,
        )
        .unwrap();

        let ws = Workspace::open(tmp.path(), Overrides::default()).unwrap();
        assert_eq!(ws.jobs_path(), tmp.path().join("alt.jsonl"));
        assert_eq!(
            ws.project_start().unwrap(),
            parse_timestamp("2026-02-18T00:00:00Z")
        );
        assert_eq!(ws.intake().unwrap().accepted.len(), 2);
    }

    #[test]
    fn flag_overrides_win() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = init(tmp.path());
        std::fs::write(&paths.rates_json, RATES).unwrap();
        let other = tmp.path().join("other-rates.json");
        std::fs::write(
            &other,
            r#"{"classes":{"gpu-4x":{"unit_count":1,"rate_per_unit_per_second":1.0}}}"#,
        )
        .unwrap();

        let ws = Workspace::open(
            tmp.path(),
            Overrides {
                jobs: Some(tmp.path().join("j.jsonl")),
                rates: Some(other),
            },
        )
        .unwrap();
        assert_eq!(ws.jobs_path(), tmp.path().join("j.jsonl"));
        assert!((ws.rates().unwrap().resolve("gpu-4x") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn persist_report_retries_on_collision() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = init(tmp.path());
        let ws = Workspace::open(tmp.path(), Overrides::default()).unwrap();
        let store = ws.store();
        let as_of = parse_timestamp("2026-02-18T12:00:00Z").unwrap();
        let mut report = ws.compute(Some(as_of)).unwrap();
        report.generated_at = as_of + time::Duration::milliseconds(5);

        let k1 = persist_report(&store, &report).unwrap();
        let k2 = persist_report(&store, &report).unwrap();
        assert_ne!(k1, k2);
        assert!(paths.latest_json.exists());
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn overflowing_total_is_not_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = init(tmp.path());
        std::fs::write(
            &paths.rates_json,
            r#"{"classes":{"big":{"unit_count":4000000000,"rate_per_unit_per_second":1e298}}}"#,
        )
        .unwrap();
        std::fs::write(
            &paths.jobs_jsonl,
            r#"{"id":"1","resource_class":"big","start_time":"2026-02-18T10:00:00Z","end_time":"2026-02-18T11:00:00Z","status":"completed"}"#,
        )
        .unwrap();

        let ws = Workspace::open(tmp.path(), Overrides::default()).unwrap();
        let report = ws.compute(parse_timestamp("2026-02-18T12:00:00Z")).unwrap();
        assert!(report.total_points.is_infinite());

        let store = ws.store();
        assert!(matches!(
            persist_report(&store, &report),
            Err(StoreError::NonFinite { .. })
        ));
        assert!(store.latest().unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn empty_workspace_computes_zero_report() {
        let tmp = tempfile::tempdir().unwrap();
        init(tmp.path());
        let ws = Workspace::open(tmp.path(), Overrides::default()).unwrap();
        let report = ws.compute(None).unwrap();
        assert_eq!(report.total_points, 0.0);
        assert_eq!(report.job_count, 0);
    }
}
