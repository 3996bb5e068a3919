use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One contiguous span of attributed work time, derived from attendance
/// record transitions.
///
/// Segments are never authored directly: the reconciliation pass opens one
/// when a record becomes active with an attribution, and the only permitted
/// mutation afterwards is open -> closed (setting `end_at`). `end_at` is
/// serialized as an explicit `null` while open so the store's null filter
/// (`end_at=is.null`) finds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorklogSegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: String,
    pub work_date: NaiveDate,
    pub start_at: DateTime<Utc>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "unknown".to_string()
}

impl WorklogSegment {
    pub fn open(
        user_id: impl Into<String>,
        work_date: NaiveDate,
        start_at: DateTime<Utc>,
        project_id: Option<String>,
        task_id: Option<String>,
        source: impl Into<String>,
    ) -> Self {
        let source = source.into();
        Self {
            id: None,
            user_id: user_id.into(),
            work_date,
            start_at,
            end_at: None,
            project_id,
            task_id,
            source: if source.is_empty() { default_source() } else { source },
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_open_segment_serializes_null_end() {
        let seg = WorklogSegment::open(
            "u1",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            Some("proj1".to_string()),
            None,
            "clockIn",
        );
        let json = serde_json::to_value(&seg).unwrap();
        assert!(json["end_at"].is_null());
        assert!(json.get("id").is_none(), "unset id must not be sent to the store");
        assert_eq!(json["source"], "clockIn");
    }

    #[test]
    fn test_empty_source_falls_back_to_unknown() {
        let seg = WorklogSegment::open(
            "u1",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            None,
            None,
            "",
        );
        assert_eq!(seg.source, "unknown");
    }
}
