use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// All instants in the ledger are UTC-normalized `OffsetDateTime`s.
pub type Timestamp = time::OffsetDateTime;

/// Job identifier as reported by the source log.
pub type JobId = String;

/// Current schema version for persisted reports.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Lifecycle state of a metered allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    Unknown,
}

impl JobStatus {
    /// Map a scheduler status word onto the ledger's lifecycle states.
    /// Terminal failure states count as completed: the allocation was held
    /// until its end time either way.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" | "failed" | "timeout" => JobStatus::Completed,
            "cancelled" | "canceled" => JobStatus::Cancelled,
            _ => JobStatus::Unknown,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
            JobStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// One metered allocation, as accepted by normalization. Never mutated by
/// the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub resource_class: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: Timestamp,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<Timestamp>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub cancelled_time: Option<Timestamp>,
    pub status: JobStatus,
}

impl JobRecord {
    /// `end_time`, else `cancelled_time`. The running-job projection to the
    /// query horizon is the sweep engine's business.
    pub fn recorded_end(&self) -> Option<Timestamp> {
        self.end_time.or(self.cancelled_time)
    }
}

/// Cumulative consumption at one checkpoint of the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    #[serde(with = "time::serde::rfc3339")]
    pub time: Timestamp,
    pub cumulative_total: f64,
}

/// Summary of one ledger recomputation. Persisted as a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: Timestamp,
    #[serde(with = "time::serde::rfc3339")]
    pub as_of: Timestamp,
    pub total_points: f64,
    pub job_count: usize,
    pub running_job_count: usize,
    pub timeline: Vec<TimelinePoint>,
    #[serde(default)]
    pub rejected_count: usize,
    #[serde(default)]
    pub malformed_count: usize,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unresolved_classes: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_class: BTreeMap<String, f64>,
}
