use crate::workspace::Workspace;

/// `meterline history`: list persisted snapshots, newest first.
pub fn execute(ws: &Workspace, limit: usize) -> anyhow::Result<()> {
    let store = ws.store();
    let mut keys = store.list()?;
    keys.reverse();
    if limit > 0 {
        keys.truncate(limit);
    }
    if keys.is_empty() {
        println!("No snapshots.");
        return Ok(());
    }
    for key in &keys {
        match store.get(key) {
            Ok(Some(r)) => println!(
                "{key}  total={:.2}  jobs={}  running={}",
                r.total_points, r.job_count, r.running_job_count
            ),
            Ok(None) => println!("{key}  (missing)"),
            Err(e) => println!("{key}  (unreadable: {e})"),
        }
    }
    println!("\n({} snapshots shown)", keys.len());
    Ok(())
}
