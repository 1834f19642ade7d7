use crate::render::print_report;
use crate::workspace::{persist_report, Workspace};
use meterline_core::timestamp::parse_timestamp;

/// `meterline report`: recompute from all job records and persist a snapshot.
pub fn execute(ws: &Workspace, json: bool) -> anyhow::Result<()> {
    let report = ws.compute(None)?;
    let key = persist_report(&ws.store(), &report)?;
    if !json {
        println!("Snapshot {key}");
    }
    print_report(&report, json)
}

/// `meterline as-of <timestamp>`: recompute up to a past instant. Nothing is persisted.
pub fn as_of(ws: &Workspace, timestamp: &str, json: bool) -> anyhow::Result<()> {
    let as_of = parse_timestamp(timestamp).ok_or_else(|| {
        anyhow::anyhow!(
            "not a timestamp: {timestamp} (expected RFC 3339, e.g. 2026-02-18T10:00:00Z)"
        )
    })?;
    let report = ws.compute(Some(as_of))?;
    print_report(&report, json)
}
