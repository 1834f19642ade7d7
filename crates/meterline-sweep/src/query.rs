use crate::engine::{integrate, integrate_with, SweepOptions};
use meterline_core::{JobRecord, RateTable, Timestamp};

/// Cumulative total as it stood at `as_of`. Nothing is persisted.
pub fn total_at(jobs: &[JobRecord], rates: &RateTable, as_of: Timestamp) -> f64 {
    integrate(jobs, rates, Some(as_of)).total()
}

/// [`total_at`] with an explicit accounting epoch.
pub fn total_at_with(
    jobs: &[JobRecord],
    rates: &RateTable,
    as_of: Timestamp,
    project_start: Option<Timestamp>,
) -> f64 {
    integrate_with(
        jobs,
        rates,
        SweepOptions {
            as_of: Some(as_of),
            project_start,
        },
    )
    .total()
}
