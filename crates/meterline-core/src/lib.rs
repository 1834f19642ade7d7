pub mod hash;
pub mod normalize;
pub mod rate;
pub mod source;
pub mod timestamp;
pub mod types;

pub use normalize::{normalize, normalize_all, Intake, Normalized, RawJob, RejectReason, Rejection};
pub use rate::{RateEntry, RateTable, RateTableError, Resolution};
pub use types::*;
