//! Event-sweep integration of the aggregate consumption rate.
//!
//! Every contributing job becomes a `(start, +rate)` / `(end, -rate)` pair.
//! Sorting the pairs by time and walking them while holding the current
//! aggregate rate turns a piecewise-constant, multi-source rate into a
//! cumulative total. Overlapping jobs simply add their rates.
//!
//! Events at the same instant are ordered by emission sequence: jobs in
//! input order, each emitting its start before its end. That order only
//! decides which intermediate checkpoint is listed first; a zero-length step
//! adds nothing, so totals never depend on it.

use meterline_core::timestamp::{now_utc, whole_seconds_between};
use meterline_core::{JobId, JobRecord, JobStatus, RateTable, TimelinePoint, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Why a job did not contribute to a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Pending,
    /// No end or cancellation time and not running.
    NoResolvableEnd,
    /// Recorded end precedes the start. Counted as malformed.
    EndBeforeStart,
    /// Starts at or after the query horizon.
    NotStartedByHorizon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedJob {
    pub id: JobId,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    /// Query horizon; `None` means now.
    pub as_of: Option<Timestamp>,
    /// Epoch the accounting starts from; `None` means one hour before the
    /// earliest event.
    pub project_start: Option<Timestamp>,
}

impl SweepOptions {
    pub fn as_of(mut self, t: Timestamp) -> Self {
        self.as_of = Some(t);
        self
    }

    pub fn project_start(mut self, t: Timestamp) -> Self {
        self.project_start = Some(t);
        self
    }
}

/// Output of one sweep: the cumulative timeline plus what was left out.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub horizon: Timestamp,
    pub timeline: Vec<TimelinePoint>,
    pub skipped: Vec<SkippedJob>,
    pub unresolved_classes: BTreeSet<String>,
    pub by_class: BTreeMap<String, f64>,
}

impl Sweep {
    /// Cumulative total up to the horizon.
    pub fn total(&self) -> f64 {
        self.timeline
            .last()
            .map(|p| p.cumulative_total)
            .unwrap_or(0.0)
    }

    pub fn malformed_count(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| s.reason == SkipReason::EndBeforeStart)
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
struct RateEvent {
    time: Timestamp,
    delta_rate: f64,
    opens: bool,
    seq: usize,
}

const DEFAULT_LEAD_IN: time::Duration = time::Duration::hours(1);

/// Integrate with the default project start. See [`integrate_with`].
pub fn integrate(jobs: &[JobRecord], rates: &RateTable, as_of: Option<Timestamp>) -> Sweep {
    integrate_with(
        jobs,
        rates,
        SweepOptions {
            as_of,
            project_start: None,
        },
    )
}

/// Build the cumulative consumption timeline for `jobs` up to the horizon.
///
/// Pure: no I/O, inputs untouched, same output for the same jobs and
/// options (except that a `None` horizon reads the clock).
pub fn integrate_with(jobs: &[JobRecord], rates: &RateTable, opts: SweepOptions) -> Sweep {
    let horizon = opts.as_of.unwrap_or_else(now_utc);
    let mut skipped = Vec::new();
    let mut unresolved_classes = BTreeSet::new();
    let mut by_class: BTreeMap<String, f64> = BTreeMap::new();
    let mut events: Vec<RateEvent> = Vec::with_capacity(jobs.len() * 2);

    for job in jobs {
        let end = match contributing_interval(job, horizon) {
            Ok(end) => end,
            Err(reason) => {
                if reason == SkipReason::EndBeforeStart {
                    tracing::warn!(job_id = %job.id, "job ends before it starts, skipped");
                }
                skipped.push(SkippedJob {
                    id: job.id.clone(),
                    reason,
                });
                continue;
            }
        };

        let resolution = rates.lookup(&job.resource_class);
        if resolution.fallback && unresolved_classes.insert(job.resource_class.clone()) {
            tracing::warn!(
                resource_class = %job.resource_class,
                rate = resolution.rate,
                "resource class not in rate table, using default rate"
            );
        }
        let rate = resolution.rate;

        let secs = whole_seconds_between(job.start_time, end).max(0);
        *by_class.entry(job.resource_class.clone()).or_insert(0.0) += rate * secs as f64;

        let seq = events.len();
        events.push(RateEvent {
            time: job.start_time,
            delta_rate: rate,
            opens: true,
            seq,
        });
        events.push(RateEvent {
            time: end,
            delta_rate: -rate,
            opens: false,
            seq: seq + 1,
        });
    }

    events.sort_by(|a, b| a.time.cmp(&b.time).then(a.seq.cmp(&b.seq)));

    let project_start = opts
        .project_start
        .or_else(|| events.first().map(|e| e.time - DEFAULT_LEAD_IN))
        .unwrap_or(horizon - DEFAULT_LEAD_IN);

    let timeline = sweep_events(&events, project_start);

    tracing::debug!(
        jobs = jobs.len(),
        events = events.len(),
        skipped = skipped.len(),
        "sweep complete"
    );

    Sweep {
        horizon,
        timeline,
        skipped,
        unresolved_classes,
        by_class,
    }
}

/// Resolve the `[start, end]` a job contributes up to `horizon`, or why it
/// contributes nothing.
fn contributing_interval(job: &JobRecord, horizon: Timestamp) -> Result<Timestamp, SkipReason> {
    if job.status == JobStatus::Pending {
        return Err(SkipReason::Pending);
    }
    let end = match job.recorded_end() {
        Some(end) => {
            if end < job.start_time {
                return Err(SkipReason::EndBeforeStart);
            }
            end
        }
        None if job.status == JobStatus::Running => horizon,
        None => return Err(SkipReason::NoResolvableEnd),
    };
    if job.start_time >= horizon {
        return Err(SkipReason::NotStartedByHorizon);
    }
    Ok(end.min(horizon))
}

fn sweep_events(events: &[RateEvent], project_start: Timestamp) -> Vec<TimelinePoint> {
    if events.is_empty() {
        return vec![TimelinePoint {
            time: project_start,
            cumulative_total: 0.0,
        }];
    }

    let mut timeline = Vec::with_capacity(events.len());
    let mut current_rate = 0.0_f64;
    let mut active = 0_usize;
    let mut total = 0.0_f64;
    let mut last_time = project_start;

    for ev in events {
        let secs = whole_seconds_between(last_time, ev.time);
        if secs > 0 {
            total += current_rate.max(0.0) * secs as f64;
        }
        timeline.push(TimelinePoint {
            time: ev.time,
            cumulative_total: total,
        });

        current_rate += ev.delta_rate;
        if ev.opens {
            active += 1;
        } else {
            active = active.saturating_sub(1);
        }
        // Repeated add/subtract of rates leaves residue; snap back when idle.
        if active == 0 {
            current_rate = 0.0;
        }
        last_time = ev.time;
    }
    timeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterline_core::RateEntry;

    const T0: i64 = 1_771_408_800; // 2026-02-18T10:00:00Z

    fn ts(offset: i64) -> Timestamp {
        Timestamp::from_unix_timestamp(T0 + offset).unwrap()
    }

    fn job(id: &str, class: &str, start: i64, end: Option<i64>, status: JobStatus) -> JobRecord {
        JobRecord {
            id: id.into(),
            resource_class: class.into(),
            start_time: ts(start),
            end_time: end.map(ts),
            cancelled_time: None,
            status,
        }
    }

    fn rates() -> RateTable {
        RateTable::from_entries([
            RateEntry::new("gpu-4x", 4, 0.007),
            RateEntry::new("cpu-2x", 2, 0.014),
            RateEntry::new("small", 1, 0.01),
            RateEntry::new("large", 1, 0.03),
        ])
        .unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn single_job_reference_total() {
        let jobs = vec![job("a", "gpu-4x", 0, Some(1800), JobStatus::Completed)];
        let sweep = integrate(&jobs, &rates(), Some(ts(3600)));
        assert!(close(sweep.total(), 50.4), "got {}", sweep.total());
    }

    #[test]
    fn overlapping_classes_superpose() {
        let a = job("a", "gpu-4x", 0, Some(1800), JobStatus::Completed);
        let b = job("b", "cpu-2x", 900, Some(2400), JobStatus::Completed);
        let forward = integrate(&[a.clone(), b.clone()], &rates(), Some(ts(3600)));
        let reverse = integrate(&[b, a], &rates(), Some(ts(3600)));
        assert!(close(forward.total(), 92.4), "got {}", forward.total());
        assert!(close(reverse.total(), 92.4), "got {}", reverse.total());
        assert!(close(forward.by_class["gpu-4x"], 50.4));
        assert!(close(forward.by_class["cpu-2x"], 42.0));
    }

    #[test]
    fn fully_overlapping_jobs_are_additive() {
        let jobs = vec![
            job("a", "small", 0, Some(600), JobStatus::Completed),
            job("b", "large", 0, Some(600), JobStatus::Completed),
        ];
        let sweep = integrate(&jobs, &rates(), Some(ts(600)));
        assert!(close(sweep.total(), (0.01 + 0.03) * 600.0));
    }

    #[test]
    fn sequential_jobs_sum_independent_of_order() {
        let a = job("a", "small", 0, Some(100), JobStatus::Completed);
        let b = job("b", "large", 200, Some(500), JobStatus::Completed);
        let c = job("c", "gpu-4x", 600, Some(610), JobStatus::Cancelled);
        let expected = 0.01 * 100.0 + 0.03 * 300.0 + 0.028 * 10.0;
        for order in [
            vec![a.clone(), b.clone(), c.clone()],
            vec![c.clone(), a.clone(), b.clone()],
            vec![b, c, a],
        ] {
            let sweep = integrate(&order, &rates(), Some(ts(1000)));
            assert!(close(sweep.total(), expected), "got {}", sweep.total());
        }
    }

    #[test]
    fn timeline_is_monotonic_and_time_ordered() {
        let jobs = vec![
            job("a", "gpu-4x", 0, Some(1800), JobStatus::Completed),
            job("b", "cpu-2x", 900, Some(2400), JobStatus::Completed),
            job("c", "small", 100, Some(100), JobStatus::Completed),
            job("d", "large", 2000, None, JobStatus::Running),
        ];
        let sweep = integrate(&jobs, &rates(), Some(ts(5000)));
        for pair in sweep.timeline.windows(2) {
            assert!(pair[0].time <= pair[1].time);
            assert!(pair[0].cumulative_total <= pair[1].cumulative_total);
        }
    }

    #[test]
    fn integrate_is_idempotent() {
        let jobs = vec![
            job("a", "gpu-4x", 0, Some(1800), JobStatus::Completed),
            job("b", "unlisted", 300, None, JobStatus::Running),
        ];
        let first = integrate(&jobs, &rates(), Some(ts(4000)));
        let second = integrate(&jobs, &rates(), Some(ts(4000)));
        assert_eq!(first, second);
    }

    #[test]
    fn running_job_projects_to_horizon() {
        let jobs = vec![job("r", "gpu-4x", 100, None, JobStatus::Running)];
        let sweep = integrate(&jobs, &rates(), Some(ts(1000)));
        assert!(close(sweep.total(), 0.028 * 900.0));
    }

    #[test]
    fn horizon_clips_recorded_end() {
        let jobs = vec![job("a", "small", 0, Some(1000), JobStatus::Completed)];
        let sweep = integrate(&jobs, &rates(), Some(ts(400)));
        assert!(close(sweep.total(), 4.0));
        assert_eq!(sweep.timeline.last().unwrap().time, ts(400));
    }

    #[test]
    fn empty_input_yields_single_zero_point() {
        let start = ts(-7200);
        let sweep = integrate_with(
            &[],
            &rates(),
            SweepOptions::default().as_of(ts(0)).project_start(start),
        );
        assert_eq!(
            sweep.timeline,
            vec![TimelinePoint {
                time: start,
                cumulative_total: 0.0
            }]
        );
        assert_eq!(sweep.total(), 0.0);
    }

    #[test]
    fn empty_input_defaults_start_before_horizon() {
        let sweep = integrate(&[], &rates(), Some(ts(0)));
        assert_eq!(sweep.timeline.len(), 1);
        assert_eq!(sweep.timeline[0].time, ts(-3600));
    }

    #[test]
    fn zero_width_job_contributes_nothing() {
        let jobs = vec![
            job("z", "large", 50, Some(50), JobStatus::Completed),
            job("a", "small", 0, Some(100), JobStatus::Completed),
        ];
        let sweep = integrate(&jobs, &rates(), Some(ts(200)));
        assert!(close(sweep.total(), 1.0));
        assert!(close(sweep.by_class["large"], 0.0));
    }

    #[test]
    fn end_before_start_is_skipped_and_flagged() {
        let jobs = vec![
            job("bad", "small", 500, Some(100), JobStatus::Completed),
            job("ok", "small", 0, Some(100), JobStatus::Completed),
        ];
        let sweep = integrate(&jobs, &rates(), Some(ts(1000)));
        assert!(close(sweep.total(), 1.0));
        assert_eq!(sweep.malformed_count(), 1);
        assert_eq!(
            sweep.skipped,
            vec![SkippedJob {
                id: "bad".into(),
                reason: SkipReason::EndBeforeStart
            }]
        );
    }

    #[test]
    fn non_contributing_statuses_are_classified() {
        let mut cancelled = job("c", "small", 0, None, JobStatus::Cancelled);
        cancelled.cancelled_time = Some(ts(60));
        let jobs = vec![
            job("p", "small", 0, Some(100), JobStatus::Pending),
            job("u", "small", 0, None, JobStatus::Unknown),
            job("f", "small", 2000, None, JobStatus::Running),
            job("k", "small", 0, Some(30), JobStatus::Unknown),
            cancelled,
        ];
        let sweep = integrate(&jobs, &rates(), Some(ts(1000)));
        let reasons: Vec<_> = sweep.skipped.iter().map(|s| (s.id.as_str(), s.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                ("p", SkipReason::Pending),
                ("u", SkipReason::NoResolvableEnd),
                ("f", SkipReason::NotStartedByHorizon),
            ]
        );
        // unknown-with-end (30s) and cancelled-at-60s both count
        assert!(close(sweep.total(), 0.01 * 90.0));
    }

    #[test]
    fn unresolved_class_uses_default_and_is_reported() {
        let jobs = vec![
            job("a", "mystery", 0, Some(100), JobStatus::Completed),
            job("b", "mystery", 0, Some(100), JobStatus::Completed),
        ];
        let sweep = integrate(&jobs, &rates(), Some(ts(200)));
        assert!(close(sweep.total(), 2.0 * 0.007 * 100.0));
        assert_eq!(
            sweep.unresolved_classes.iter().collect::<Vec<_>>(),
            vec!["mystery"]
        );
    }

    #[test]
    fn tied_events_follow_input_order() {
        // b starts exactly when a ends; a's end is emitted first.
        let jobs = vec![
            job("a", "small", 0, Some(100), JobStatus::Completed),
            job("b", "large", 100, Some(200), JobStatus::Completed),
        ];
        let sweep = integrate(&jobs, &rates(), Some(ts(300)));
        let times: Vec<_> = sweep.timeline.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![ts(0), ts(100), ts(100), ts(200)]);
        assert!(close(sweep.total(), 1.0 + 3.0));
    }

    #[test]
    fn explicit_project_start_only_shapes_the_timeline() {
        let jobs = vec![job("a", "small", 0, Some(100), JobStatus::Completed)];
        let early = integrate_with(
            &jobs,
            &rates(),
            SweepOptions::default().as_of(ts(200)).project_start(ts(-86_400)),
        );
        let late = integrate(&jobs, &rates(), Some(ts(200)));
        assert!(close(early.total(), late.total()));
    }

    #[test]
    fn many_overlapping_jobs_leave_no_residual_rate() {
        let mut jobs = Vec::new();
        for i in 0..50 {
            jobs.push(job(&format!("j{i}"), "gpu-4x", i, Some(i + 7), JobStatus::Completed));
        }
        jobs.push(job("tail", "small", 1000, Some(1100), JobStatus::Completed));
        let sweep = integrate(&jobs, &rates(), Some(ts(2000)));
        let expected = 50.0 * 0.028 * 7.0 + 0.01 * 100.0;
        assert!(close(sweep.total(), expected), "got {}", sweep.total());
    }
}
