pub mod attendance_service;
pub mod settings_service;

pub use attendance_service::{AttendanceService, AttendanceSettings, PatchOutcome};
pub use settings_service::SettingsService;
