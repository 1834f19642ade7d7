mod engine;
mod query;
mod report;

pub use engine::{integrate, integrate_with, SkipReason, SkippedJob, Sweep, SweepOptions};
pub use query::{total_at, total_at_with};
pub use report::{build_report, ReportBuilder};

use meterline_core::{Intake, RateTable, Report};

/// Full batch recomputation: sweep the accepted jobs and package the result,
/// carrying the intake's rejection count into the report.
pub fn recompute(intake: &Intake, rates: &RateTable, opts: SweepOptions) -> Report {
    let sweep = integrate_with(&intake.accepted, rates, opts);
    ReportBuilder::new()
        .rejected(intake.rejected_count())
        .build(&sweep, &intake.accepted)
}
