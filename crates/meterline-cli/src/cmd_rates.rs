use crate::workspace::Workspace;

/// `meterline rates`: print the effective rate table.
pub fn execute(ws: &Workspace) -> anyhow::Result<()> {
    let table = ws.rates()?;
    println!(
        "{:<20} {:>6} {:>14} {:>14}",
        "CLASS", "UNITS", "PER UNIT/S", "EFFECTIVE/S"
    );
    for entry in table.entries() {
        println!(
            "{:<20} {:>6} {:>14.6} {:>14.6}",
            entry.resource_class,
            entry.unit_count,
            entry.rate_per_unit_per_second,
            entry.effective_rate()
        );
    }
    let d = table.default_entry();
    println!(
        "{:<20} {:>6} {:>14.6} {:>14.6}",
        "(default)",
        d.unit_count,
        d.rate_per_unit_per_second,
        d.effective_rate()
    );
    Ok(())
}
