pub mod action;
pub mod record;
pub mod worklog;

pub use action::PatchAction;
pub use record::{AttendanceLocation, AttendanceRecord, AttendanceStatus, BreakSpan};
pub use worklog::WorklogSegment;

/// Trim an optional id-ish value; empty or whitespace-only collapses to None.
pub(crate) fn norm_id(value: Option<&str>) -> Option<String> {
    let trimmed = value.unwrap_or("").trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
