use crate::engine::Sweep;
use meterline_core::timestamp::now_utc;
use meterline_core::{JobRecord, JobStatus, Report, Timestamp, REPORT_SCHEMA_VERSION};

/// Packages sweep output into a [`Report`]. Tallying only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportBuilder {
    generated_at: Option<Timestamp>,
    rejected_count: usize,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a fixed generation time instead of reading the clock.
    pub fn generated_at(mut self, t: Timestamp) -> Self {
        self.generated_at = Some(t);
        self
    }

    /// Number of records dropped during normalization.
    pub fn rejected(mut self, count: usize) -> Self {
        self.rejected_count = count;
        self
    }

    pub fn build(&self, sweep: &Sweep, jobs: &[JobRecord]) -> Report {
        Report {
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at: self.generated_at.unwrap_or_else(now_utc),
            as_of: sweep.horizon,
            total_points: sweep.total(),
            // accepted records always carry a start_time
            job_count: jobs.len(),
            running_job_count: jobs
                .iter()
                .filter(|j| j.status == JobStatus::Running)
                .count(),
            timeline: sweep.timeline.clone(),
            rejected_count: self.rejected_count,
            malformed_count: sweep.malformed_count(),
            unresolved_classes: sweep.unresolved_classes.clone(),
            by_class: sweep.by_class.clone(),
        }
    }
}

/// Build a report stamped with the current time.
pub fn build_report(sweep: &Sweep, jobs: &[JobRecord]) -> Report {
    ReportBuilder::new().build(sweep, jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::integrate;
    use meterline_core::{RateEntry, RateTable};

    const T0: i64 = 1_771_408_800;

    fn ts(offset: i64) -> Timestamp {
        Timestamp::from_unix_timestamp(T0 + offset).unwrap()
    }

    fn job(id: &str, class: &str, end: Option<i64>, status: JobStatus) -> JobRecord {
        JobRecord {
            id: id.into(),
            resource_class: class.into(),
            start_time: ts(0),
            end_time: end.map(ts),
            cancelled_time: None,
            status,
        }
    }

    #[test]
    fn counts_jobs_and_running_jobs() {
        let rates = RateTable::from_entries([RateEntry::new("gpu-4x", 4, 0.007)]).unwrap();
        let jobs = vec![
            job("a", "gpu-4x", Some(1800), JobStatus::Completed),
            job("b", "gpu-4x", None, JobStatus::Running),
            job("c", "unknown-class", None, JobStatus::Running),
            job("d", "gpu-4x", None, JobStatus::Pending),
        ];
        let sweep = integrate(&jobs, &rates, Some(ts(1800)));
        let report = ReportBuilder::new()
            .generated_at(ts(1801))
            .rejected(3)
            .build(&sweep, &jobs);

        assert_eq!(report.job_count, 4);
        assert_eq!(report.running_job_count, 2);
        assert_eq!(report.rejected_count, 3);
        assert_eq!(report.generated_at, ts(1801));
        assert_eq!(report.as_of, ts(1800));
        assert_eq!(report.timeline, sweep.timeline);
        assert!((report.total_points - sweep.total()).abs() < 1e-12);
        assert!(report.unresolved_classes.contains("unknown-class"));
        assert_eq!(report.schema_version, REPORT_SCHEMA_VERSION);
    }

    #[test]
    fn empty_input_is_a_valid_zero_report() {
        let sweep = integrate(&[], &RateTable::default(), Some(ts(0)));
        let report = build_report(&sweep, &[]);
        assert_eq!(report.total_points, 0.0);
        assert_eq!(report.job_count, 0);
        assert_eq!(report.running_job_count, 0);
        assert_eq!(report.timeline.len(), 1);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""total_points":0.0"#));
        assert!(!json.contains("unresolved_classes"));
    }
}
