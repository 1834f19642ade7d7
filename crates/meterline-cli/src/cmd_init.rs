use meterline_core::RateTable;
use meterline_store::MeterPaths;
use std::path::Path;

pub fn execute(root: &Path) -> anyhow::Result<()> {
    let paths = MeterPaths::discover(root);

    if paths.is_initialized() {
        // Repair a partially created layout
        paths.ensure_layout()?;
        println!("Already initialized at {}", paths.meter_dir.display());
        return Ok(());
    }

    paths.ensure_layout()?;

    if paths.rates_file().is_none() {
        let rates = RateTable::default().to_json_pretty()?;
        meterline_store::write_atomic(&paths.rates_json, rates.as_bytes())?;
    }

    println!("Initialized {}", paths.meter_dir.display());
    println!("  rates: {}", paths.rates_json.display());
    println!("  jobs:  {}", paths.jobs_jsonl.display());
    Ok(())
}
