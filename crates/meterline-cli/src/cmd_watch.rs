use crate::workspace::{persist_report, Workspace};
use meterline_core::Report;
use meterline_store::{SnapshotKey, SnapshotStore, WorkspaceLock};
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchStats {
    pub persisted: u64,
    pub failed: u64,
}

fn cycle(ws: &Workspace, store: &SnapshotStore) -> anyhow::Result<(SnapshotKey, Report)> {
    let report = ws.compute(None)?;
    let key = persist_report(store, &report)?;
    Ok((key, report))
}

/// Recompute and persist every `interval`. A failed cycle is logged and the
/// loop carries on; `cycles` bounds the number of iterations.
pub fn run(
    ws: &Workspace,
    interval: Duration,
    cycles: Option<u64>,
) -> anyhow::Result<WatchStats> {
    let _lock = WorkspaceLock::acquire(&ws.paths)?;
    let store = ws.store();
    let mut stats = WatchStats::default();
    let mut n = 0_u64;

    loop {
        match cycle(ws, &store) {
            Ok((key, report)) => {
                stats.persisted += 1;
                println!(
                    "{key}  total={:.2}  jobs={}  running={}",
                    report.total_points, report.job_count, report.running_job_count
                );
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!(error = %format!("{e:#}"), "recompute cycle failed, will retry");
            }
        }
        n += 1;
        if cycles.is_some_and(|c| n >= c) {
            break;
        }
        std::thread::sleep(interval);
    }
    Ok(stats)
}

/// `meterline watch`
pub fn execute(ws: &Workspace, interval_secs: u64, cycles: Option<u64>) -> anyhow::Result<()> {
    eprintln!("meterline watch: recomputing every {interval_secs}s (Ctrl-C to stop)");
    let stats = run(ws, Duration::from_secs(interval_secs), cycles)?;
    eprintln!(
        "{} snapshots persisted, {} cycles failed",
        stats.persisted, stats.failed
    );
    Ok(())
}
