//! Default job source: one raw record per JSONL line.

use crate::normalize::{normalize, Intake, Normalized, RawJob, RejectReason, Rejection};
use std::path::Path;

/// Normalize every non-blank line of a JSONL document. Lines that are not
/// valid JSON objects become `unparsable_line` rejections.
pub fn parse_jobs_jsonl(content: &str) -> Intake {
    let mut intake = Intake::default();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawJob>(line) {
            Ok(raw) => intake.push(normalize(&raw)),
            Err(e) => {
                tracing::debug!(line = lineno + 1, error = %e, "undecodable job line");
                intake.push(Normalized::Rejected(Rejection {
                    id: None,
                    reason: RejectReason::UnparsableLine,
                }));
            }
        }
    }
    intake
}

/// Read a JSONL job file. A missing file yields an empty intake.
pub fn read_jobs_jsonl(path: &Path) -> std::io::Result<Intake> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "job source not found, treating as empty");
        return Ok(Intake::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_jobs_jsonl(&content))
}
