use serde::Deserialize;
use serde_json::Value;

use crate::error::AttendanceError;
use crate::models::record::AttendanceLocation;

/// One patch action against a user/day attendance record.
///
/// The RPC layer hands us a loose JSON object with a `type` tag; it is
/// validated into this union before any I/O so an unknown action fails the
/// call with no partial mutation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PatchAction {
    #[serde(rename = "clockIn")]
    ClockIn {
        #[serde(default)]
        location: Option<AttendanceLocation>,
    },
    #[serde(rename = "clockOut")]
    ClockOut,
    #[serde(rename = "toggleBreak")]
    ToggleBreak,
    #[serde(rename = "toggleOut")]
    ToggleOut,
    #[serde(rename = "setLocation")]
    SetLocation { location: AttendanceLocation },
    #[serde(rename = "setProjectTask")]
    SetProjectTask {
        #[serde(default, rename = "projectId")]
        project_id: Option<String>,
        #[serde(default, rename = "taskId")]
        task_id: Option<String>,
    },
    #[serde(rename = "setNotes")]
    SetNotes { notes: String },
}

impl PatchAction {
    /// Validate a loose payload at the boundary.
    pub fn from_value(value: Value) -> Result<Self, AttendanceError> {
        if !value.is_object() {
            return Err(AttendanceError::InvalidAction("action is required".to_string()));
        }
        serde_json::from_value(value).map_err(|e| AttendanceError::InvalidAction(e.to_string()))
    }

    /// The wire tag, recorded as the `source` of any worklog segment the
    /// action opens.
    pub fn kind(&self) -> &'static str {
        match self {
            PatchAction::ClockIn { .. } => "clockIn",
            PatchAction::ClockOut => "clockOut",
            PatchAction::ToggleBreak => "toggleBreak",
            PatchAction::ToggleOut => "toggleOut",
            PatchAction::SetLocation { .. } => "setLocation",
            PatchAction::SetProjectTask { .. } => "setProjectTask",
            PatchAction::SetNotes { .. } => "setNotes",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_clock_in_with_location() {
        let action = PatchAction::from_value(json!({ "type": "clockIn", "location": "remote" }))
            .unwrap();
        match action {
            PatchAction::ClockIn { location } => {
                assert_eq!(location, Some(AttendanceLocation::Remote));
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_parse_set_project_task_camel_case() {
        let action = PatchAction::from_value(json!({
            "type": "setProjectTask",
            "projectId": "proj1",
            "taskId": "task9"
        }))
        .unwrap();
        match action {
            PatchAction::SetProjectTask { project_id, task_id } => {
                assert_eq!(project_id.as_deref(), Some("proj1"));
                assert_eq!(task_id.as_deref(), Some("task9"));
            }
            other => panic!("unexpected action: {:?}", other),
        }
        assert_eq!(
            PatchAction::from_value(json!({ "type": "setProjectTask" }))
                .unwrap()
                .kind(),
            "setProjectTask"
        );
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = PatchAction::from_value(json!({ "type": "teleport" })).unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidAction(_)), "got: {:?}", err);
    }

    #[test]
    fn test_non_object_action_is_rejected() {
        assert!(PatchAction::from_value(json!("clockIn")).is_err());
        assert!(PatchAction::from_value(json!(null)).is_err());
    }

    #[test]
    fn test_set_location_requires_payload() {
        let err = PatchAction::from_value(json!({ "type": "setLocation" })).unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidAction(_)));
    }
}
