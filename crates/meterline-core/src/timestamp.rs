use crate::types::Timestamp;
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Scheduler logs often print local-less wall clock times; those are read as UTC.
const NAIVE_FORMATS: [&[BorrowedFormatItem<'_>]; 2] = [
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
];

/// Parse a source timestamp and normalize it to UTC.
///
/// Accepts RFC 3339 with any offset, or an offset-less
/// `YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD HH:MM:SS` which is taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(t.to_offset(UtcOffset::UTC));
    }
    NAIVE_FORMATS
        .into_iter()
        .find_map(|fmt| PrimitiveDateTime::parse(s, fmt).ok())
        .map(PrimitiveDateTime::assume_utc)
}

/// Format as RFC 3339. Falls back to the unix timestamp if the value is out
/// of the representable range.
pub fn format_timestamp(t: Timestamp) -> String {
    t.format(&Rfc3339)
        .unwrap_or_else(|_| t.unix_timestamp().to_string())
}

pub fn now_utc() -> Timestamp {
    OffsetDateTime::now_utc()
}

/// Whole seconds from `from` to `to`. Sub-second parts are truncated on both
/// ends before subtracting, so literals like `10:00:00.900` and
/// `10:00:01.100` are one second apart.
pub fn whole_seconds_between(from: Timestamp, to: Timestamp) -> i64 {
    to.unix_timestamp() - from.unix_timestamp()
}
