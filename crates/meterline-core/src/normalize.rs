use crate::timestamp::parse_timestamp;
use crate::types::{JobRecord, JobStatus, Timestamp};
use serde::{Deserialize, Serialize};

/// Fields as extracted from a source log, before validation. Every field is
/// optional; timestamps are still text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJob {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub resource_class: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub cancelled_time: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub status: Option<String>,
}

/// Schedulers print job ids, partitions and status codes as numbers as
/// often as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Why a raw record was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingId,
    MissingResourceClass,
    MissingStartTime,
    UnparsableTimestamp { field: String },
    /// Status says completed but the source gave no end time. Not backfilled.
    CompletedWithoutEnd,
    /// The source line could not be decoded at all.
    UnparsableLine,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingId => write!(f, "missing_id"),
            RejectReason::MissingResourceClass => write!(f, "missing_resource_class"),
            RejectReason::MissingStartTime => write!(f, "missing_start_time"),
            RejectReason::UnparsableTimestamp { field } => {
                write!(f, "unparsable_timestamp({field})")
            }
            RejectReason::CompletedWithoutEnd => write!(f, "completed_without_end"),
            RejectReason::UnparsableLine => write!(f, "unparsable_line"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Source id when one was present.
    pub id: Option<String>,
    pub reason: RejectReason,
}

/// Result of normalizing one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Accepted(JobRecord),
    Rejected(Rejection),
}

/// Accepted records in input order plus everything that was dropped.
#[derive(Debug, Clone, Default)]
pub struct Intake {
    pub accepted: Vec<JobRecord>,
    pub rejected: Vec<Rejection>,
}

impl Intake {
    pub fn push(&mut self, outcome: Normalized) {
        match outcome {
            Normalized::Accepted(job) => self.accepted.push(job),
            Normalized::Rejected(r) => {
                tracing::warn!(
                    job_id = r.id.as_deref().unwrap_or("-"),
                    reason = %r.reason,
                    "rejected job record"
                );
                self.rejected.push(r);
            }
        }
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn optional_time(v: &Option<String>, field: &str) -> Result<Option<Timestamp>, RejectReason> {
    match non_empty(v) {
        None => Ok(None),
        Some(s) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| RejectReason::UnparsableTimestamp {
                field: field.to_string(),
            }),
    }
}

fn classify(raw: &RawJob) -> Result<JobRecord, RejectReason> {
    let id = non_empty(&raw.id).ok_or(RejectReason::MissingId)?;
    let resource_class =
        non_empty(&raw.resource_class).ok_or(RejectReason::MissingResourceClass)?;
    let start_time =
        optional_time(&raw.start_time, "start_time")?.ok_or(RejectReason::MissingStartTime)?;
    let end_time = optional_time(&raw.end_time, "end_time")?;
    let cancelled_time = optional_time(&raw.cancelled_time, "cancelled_time")?;
    let status = non_empty(&raw.status)
        .map(JobStatus::parse)
        .unwrap_or(JobStatus::Unknown);

    if status == JobStatus::Completed && end_time.is_none() {
        return Err(RejectReason::CompletedWithoutEnd);
    }

    Ok(JobRecord {
        id: id.to_string(),
        resource_class: resource_class.to_string(),
        start_time,
        end_time,
        cancelled_time,
        status,
    })
}

/// Validate one raw record into a [`JobRecord`] or a classified rejection.
pub fn normalize(raw: &RawJob) -> Normalized {
    match classify(raw) {
        Ok(job) => Normalized::Accepted(job),
        Err(reason) => Normalized::Rejected(Rejection {
            id: non_empty(&raw.id).map(str::to_string),
            reason,
        }),
    }
}

/// Normalize a batch, preserving input order among accepted records.
pub fn normalize_all<'a>(raws: impl IntoIterator<Item = &'a RawJob>) -> Intake {
    let mut intake = Intake::default();
    for raw in raws {
        intake.push(normalize(raw));
    }
    intake
}
