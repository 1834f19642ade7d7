use meterline_core::timestamp::format_timestamp;
use meterline_core::Report;

/// Human-readable summary lines for a report.
pub fn summary_lines(report: &Report) -> Vec<String> {
    let mut lines = vec![
        format!("Total: {:.2} points", report.total_points),
        format!("As of: {}", format_timestamp(report.as_of)),
        format!(
            "Jobs: {} ({} running)",
            report.job_count, report.running_job_count
        ),
    ];
    if report.rejected_count > 0 || report.malformed_count > 0 {
        lines.push(format!(
            "Skipped records: {} rejected, {} malformed",
            report.rejected_count, report.malformed_count
        ));
    }
    if !report.by_class.is_empty() {
        lines.push("By class:".to_string());
        for (class, total) in &report.by_class {
            lines.push(format!("  {class:<20} {total:>12.2}"));
        }
    }
    if !report.unresolved_classes.is_empty() {
        let names: Vec<&str> = report.unresolved_classes.iter().map(String::as_str).collect();
        lines.push(format!(
            "Warning: default rate used for unknown classes: {}",
            names.join(", ")
        ));
    }
    lines.push(format!(
        "Generated: {}",
        format_timestamp(report.generated_at)
    ));
    lines
}

pub fn print_report(report: &Report, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        for line in summary_lines(report) {
            println!("{line}");
        }
    }
    Ok(())
}
