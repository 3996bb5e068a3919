use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::action::PatchAction;
use crate::models::norm_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    #[default]
    NotClocked,
    Working,
    Break,
    Out,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceLocation {
    #[default]
    Office,
    Remote,
    Out,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakSpan {
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

/// One attendance record per user per calendar day.
///
/// Created lazily on the first patch action for a user/day and mutated only
/// through [`AttendanceRecord::apply`]; never deleted. The store keeps a
/// uniqueness constraint on `(user_id, work_date)` and the engine always
/// persists the full row (the store merges by overwriting every supplied
/// column).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub user_id: String,
    pub work_date: NaiveDate,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(default)]
    pub location: AttendanceLocation,
    #[serde(default)]
    pub clock_in: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clock_out: Option<DateTime<Utc>>,
    #[serde(default)]
    pub breaks: Vec<BreakSpan>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    /// Fresh record for a user/day that has no row in the store yet.
    pub fn new(user_id: impl Into<String>, work_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            created_at: None,
            user_id: user_id.into(),
            work_date,
            status: AttendanceStatus::NotClocked,
            location: AttendanceLocation::Office,
            clock_in: None,
            clock_out: None,
            breaks: Vec::new(),
            notes: String::new(),
            project_id: None,
            task_id: None,
            updated_at: Some(now),
        }
    }

    /// Whether time currently counts toward worklog attribution: an open
    /// work interval (clocked in, not clocked out) in a counting status.
    /// Break time is excluded; out-of-office time still counts.
    pub fn is_worklog_active(&self) -> bool {
        if self.clock_in.is_none() || self.clock_out.is_some() {
            return false;
        }
        matches!(self.status, AttendanceStatus::Working | AttendanceStatus::Out)
    }

    /// Status for an open work interval at the given location.
    fn status_for(location: AttendanceLocation) -> AttendanceStatus {
        if location == AttendanceLocation::Out {
            AttendanceStatus::Out
        } else {
            AttendanceStatus::Working
        }
    }

    fn close_open_break(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.breaks.last_mut() {
            if last.end.is_none() {
                last.end = Some(now);
            }
        }
    }

    /// Apply one patch action. Pure state transition; the caller stamps
    /// `updated_at` and persists.
    pub fn apply(&mut self, action: &PatchAction, now: DateTime<Utc>) {
        match action {
            PatchAction::ClockIn { location } => {
                if self.clock_in.is_none() {
                    self.clock_in = Some(now);
                }
                // A clock-in after clock-out cancels the clock-out; the user
                // most likely pressed clock-out by mistake.
                if self.clock_out.is_some() {
                    self.clock_out = None;
                }
                if let Some(location) = location {
                    self.location = *location;
                }
                self.status = Self::status_for(self.location);
            }
            PatchAction::ClockOut => {
                // Toggle: a second clock-out cancels the first.
                if self.clock_out.is_some() {
                    self.clock_out = None;
                    self.status = if self.clock_in.is_none() {
                        AttendanceStatus::NotClocked
                    } else {
                        Self::status_for(self.location)
                    };
                    return;
                }

                self.close_open_break(now);
                if self.clock_in.is_none() {
                    self.clock_in = Some(now); // defensive
                }
                self.clock_out = Some(now);
                self.status = AttendanceStatus::Done;
            }
            PatchAction::ToggleBreak => {
                if self.status == AttendanceStatus::Break {
                    self.close_open_break(now);
                    self.status = AttendanceStatus::Working;
                } else {
                    if self.clock_in.is_none() {
                        self.clock_in = Some(now); // defensive
                    }
                    self.breaks.push(BreakSpan { start: now, end: None });
                    self.status = AttendanceStatus::Break;
                }
            }
            PatchAction::ToggleOut => {
                if self.status == AttendanceStatus::Out {
                    self.status = AttendanceStatus::Working;
                    // keep location as-is; if it was out, switch back to office
                    if self.location == AttendanceLocation::Out {
                        self.location = AttendanceLocation::Office;
                    }
                } else {
                    if self.clock_in.is_none() {
                        self.clock_in = Some(now);
                    }
                    self.status = AttendanceStatus::Out;
                    self.location = AttendanceLocation::Out;
                }
            }
            PatchAction::SetLocation { location } => {
                self.location = *location;
                // Leaving the out location means the user is back at work.
                if self.status == AttendanceStatus::Out && *location != AttendanceLocation::Out {
                    self.status = AttendanceStatus::Working;
                }
            }
            PatchAction::SetProjectTask { project_id, task_id } => {
                self.project_id = norm_id(project_id.as_deref());
                self.task_id = norm_id(task_id.as_deref());
            }
            PatchAction::SetNotes { notes } => {
                self.notes = notes.clone();
            }
        }
    }
}
