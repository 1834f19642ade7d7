use crate::render::print_report;
use crate::workspace::Workspace;

/// `meterline summary`: totals from the latest snapshot, no recomputation.
pub fn execute(ws: &Workspace, json: bool) -> anyhow::Result<()> {
    let store = ws.store();
    match store.latest_snapshot()? {
        Some(snapshot) => {
            if !json {
                println!("Snapshot {}", snapshot.key);
            }
            print_report(&snapshot.report, json)
        }
        None => {
            if json {
                println!("null");
            } else {
                println!("No snapshots yet. Run `meterline report` first.");
            }
            Ok(())
        }
    }
}
