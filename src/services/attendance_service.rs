use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::AttendanceError;
use crate::models::{norm_id, AttendanceRecord, PatchAction, WorklogSegment};
use crate::services::settings_service::SettingsService;
use crate::store::{PostgrestStore, Query, RowStore, StoreError};

const RECORDS_TABLE: &str = "attendance_records";
const WORKLOGS_TABLE: &str = "attendance_worklogs";
const RECORD_CONFLICT_KEY: &str = "user_id,work_date";

const HOLIDAY_URL_KEY: &str = "attendanceHolidayUrl";
const COMPANY_HOLIDAY_URL_KEY: &str = "attendanceCompanyHolidayUrl";

/// Cap on the any-date open-segment scan; anything beyond this is garbage
/// data and gets repaired on a later pass.
const OPEN_SEGMENT_SCAN_LIMIT: u32 = 50;

/// Result of a patch: the persisted record plus an optional diagnostic from
/// the best-effort worklog reconciliation. A non-None diagnostic means the
/// record mutation succeeded but the derived segments could not be brought
/// up to date; they will self-heal on the next patch.
///
/// The diagnostic deliberately travels as `worklogSyncError`, the field name
/// existing RPC clients already consume, rather than a generic
/// `reconciliationError`.
#[derive(Debug, Clone, Serialize)]
pub struct PatchOutcome {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    #[serde(rename = "worklogSyncError")]
    pub worklog_sync_error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSettings {
    #[serde(default)]
    pub holiday_url: String,
    #[serde(default)]
    pub company_holiday_url: String,
}

/// Attendance engine: the per-user-per-day record state machine plus the
/// derived worklog segmentation, over a row-store collaborator.
///
/// Each patch is one read, one local transition, one full-row upsert, then a
/// best-effort reconciliation pass. There is no locking here: record
/// uniqueness is the store's `(user_id, work_date)` constraint, and the
/// open-segment invariant is repaired by the self-heal scan rather than
/// prevented, so concurrent patches to the same user/day can race and settle
/// on the next pass.
pub struct AttendanceService {
    store: Arc<dyn RowStore>,
    settings: SettingsService,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn RowStore>, settings_cache_ttl: Duration) -> Self {
        let settings = SettingsService::new(store.clone(), settings_cache_ttl);
        Self { store, settings }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let store: Arc<dyn RowStore> = Arc::new(PostgrestStore::new(&config.store));
        Self::new(store, Duration::from_secs(config.settings_cache_ttl_secs))
    }

    /// Engine wired to the PostgREST store described by the process
    /// environment.
    pub fn from_env() -> Result<Self, AttendanceError> {
        Ok(Self::from_config(crate::config::config()?))
    }

    /// All records for one calendar day. `None` means today (UTC).
    pub async fn get_day(&self, date: Option<&str>) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let date = match date {
            Some(d) => parse_ymd(d)?,
            None => Utc::now().date_naive(),
        };
        self.select_day(date).await
    }

    /// All records whose date falls in `[month-01, nextMonth-01)`. `None`
    /// means the current month (UTC).
    pub async fn get_month(&self, month: Option<&str>) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let start = match month {
            Some(m) => parse_ym(m)?,
            None => {
                let today = Utc::now().date_naive();
                NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
                    .ok_or_else(|| AttendanceError::InvalidMonth(today.to_string()))?
            }
        };
        let end = start
            .checked_add_months(Months::new(1))
            .ok_or_else(|| AttendanceError::InvalidMonth(start.to_string()))?;

        let query = Query::new()
            .gte("work_date", start.to_string())
            .lt("work_date", end.to_string());
        let rows = self.store.select(RECORDS_TABLE, &query).await.map_err(AttendanceError::Store)?;
        decode_records(rows)
    }

    /// Apply one patch action to the record for `(user_id, date)`, creating
    /// the record if this is the first action of the day, then reconcile the
    /// derived worklog segments.
    pub async fn patch(
        &self,
        user_id: &str,
        date: &str,
        action: PatchAction,
    ) -> Result<PatchOutcome, AttendanceError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AttendanceError::MissingUserId);
        }
        let date = parse_ymd(date.trim())?;

        let now = Utc::now();
        let mut row = self.get_or_init(user_id, date, now).await?;
        let before = row.clone();

        row.apply(&action, now);
        row.user_id = user_id.to_string();
        row.work_date = date;
        row.updated_at = Some(now);

        // Full-row merge; the store has a unique index on (user_id, work_date).
        let saved = self
            .store
            .upsert(
                RECORDS_TABLE,
                serde_json::to_value(&row).map_err(StoreError::Decode)?,
                Some(RECORD_CONFLICT_KEY),
            )
            .await
            .map_err(AttendanceError::Store)?;
        let after: AttendanceRecord = if saved.is_null() {
            row
        } else {
            serde_json::from_value(saved).map_err(StoreError::Decode)?
        };

        // Best-effort: the record is committed; a reconciliation failure is
        // reported, not raised.
        let worklog_sync_error = match self
            .sync_worklogs_for_patch(&before, &after, action.kind(), now)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("failed to sync worklogs for {}/{}: {}", user_id, date, e);
                Some(e.to_string())
            }
        };

        Ok(PatchOutcome { record: after, worklog_sync_error })
    }

    /// Boundary entry point for loose RPC payloads: validates the action
    /// before dispatching.
    pub async fn patch_value(
        &self,
        user_id: &str,
        date: &str,
        action: Value,
    ) -> Result<PatchOutcome, AttendanceError> {
        let action = PatchAction::from_value(action)?;
        self.patch(user_id, date, action).await
    }

    pub async fn get_settings(&self) -> Result<AttendanceSettings, AttendanceError> {
        let holiday_url = self.settings.get(HOLIDAY_URL_KEY).await?.unwrap_or_default();
        let company_holiday_url = self
            .settings
            .get(COMPANY_HOLIDAY_URL_KEY)
            .await?
            .unwrap_or_default();
        Ok(AttendanceSettings { holiday_url, company_holiday_url })
    }

    pub async fn set_settings(&self, settings: &AttendanceSettings) -> Result<(), AttendanceError> {
        futures::future::try_join(
            self.settings.set(HOLIDAY_URL_KEY, settings.holiday_url.trim()),
            self.settings
                .set(COMPANY_HOLIDAY_URL_KEY, settings.company_holiday_url.trim()),
        )
        .await?;
        Ok(())
    }

    async fn select_day(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let query = Query::new().eq("work_date", date.to_string());
        let rows = self.store.select(RECORDS_TABLE, &query).await.map_err(AttendanceError::Store)?;
        decode_records(rows)
    }

    async fn get_or_init(
        &self,
        user_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let day_rows = self.select_day(date).await?;
        Ok(day_rows
            .into_iter()
            .find(|r| r.user_id == user_id)
            .unwrap_or_else(|| AttendanceRecord::new(user_id, date, now)))
    }

    // ---- worklog reconciliation -------------------------------------------

    /// Keep the derived segments consistent with the record transition:
    /// at most one open segment per user, attributed to the record's current
    /// project/task whenever the record is active. Tolerates and repairs
    /// inconsistent prior states (zero or several open segments) instead of
    /// assuming a clean one.
    async fn sync_worklogs_for_patch(
        &self,
        before: &AttendanceRecord,
        after: &AttendanceRecord,
        action_kind: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let user_id = after.user_id.trim();
        if user_id.is_empty() {
            return Ok(());
        }
        let date = after.work_date;

        let after_project = norm_id(after.project_id.as_deref());
        let after_task = norm_id(after.task_id.as_deref());
        let before_active = before.is_worklog_active();
        let after_active = after.is_worklog_active();

        // Clock-out always closes every open segment, across any date, even
        // if the record was already inactive. Handles day-boundary leftovers.
        if action_kind == "clockOut" {
            return self.close_open_segments_any_date(user_id, now).await;
        }

        // 1) If now inactive, close any open segments
        if !after_active {
            return self.close_open_segments_any_date(user_id, now).await;
        }

        // 2) Becoming active: close leftovers then open new
        if !before_active {
            self.close_open_segments_any_date(user_id, now).await?;
            return self
                .open_segment(user_id, date, now, after_project, after_task, action_kind)
                .await;
        }

        // 3) Always cut when project/task changes during active state
        let before_project = norm_id(before.project_id.as_deref());
        let before_task = norm_id(before.task_id.as_deref());
        let changed = before_project != after_project || before_task != after_task;
        if action_kind == "setProjectTask" || changed {
            self.close_open_segments_any_date(user_id, now).await?;
            return self
                .open_segment(user_id, date, now, after_project, after_task, action_kind)
                .await;
        }

        // 4) Active->active self-heal: exactly one open segment must exist
        // for this user/date and match the current attribution.
        let opens = self.select_open_segments(user_id, Some(date)).await?;
        let healthy = opens.len() == 1
            && norm_id(opens[0].project_id.as_deref()) == after_project
            && norm_id(opens[0].task_id.as_deref()) == after_task;
        if !healthy {
            tracing::warn!(
                "repairing open worklogs for {}/{}: found {}, expected 1 matching",
                user_id,
                date,
                opens.len()
            );
            self.close_open_segments_any_date(user_id, now).await?;
            return self
                .open_segment(user_id, date, now, after_project, after_task, action_kind)
                .await;
        }

        Ok(())
    }

    async fn select_open_segments(
        &self,
        user_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<WorklogSegment>, StoreError> {
        let mut query = Query::new().eq("user_id", user_id);
        if let Some(date) = date {
            query = query.eq("work_date", date.to_string());
        } else {
            query = query.limit(OPEN_SEGMENT_SCAN_LIMIT);
        }
        query = query.is_null("end_at").order_desc("start_at");

        let rows = self.store.select(WORKLOGS_TABLE, &query).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::Decode))
            .collect()
    }

    /// Close every open segment for the user across any work date. Rewrites
    /// each full row: the store merge overwrites all supplied columns.
    async fn close_open_segments_any_date(
        &self,
        user_id: &str,
        end_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let opens = self.select_open_segments(user_id, None).await?;
        for mut open in opens {
            if open.id.is_none() {
                continue;
            }
            open.end_at = Some(end_at);
            self.store
                .upsert(
                    WORKLOGS_TABLE,
                    serde_json::to_value(&open).map_err(StoreError::Decode)?,
                    Some("id"),
                )
                .await?;
        }
        Ok(())
    }

    async fn open_segment(
        &self,
        user_id: &str,
        date: NaiveDate,
        start_at: DateTime<Utc>,
        project_id: Option<String>,
        task_id: Option<String>,
        source: &str,
    ) -> Result<(), StoreError> {
        let segment = WorklogSegment::open(user_id, date, start_at, project_id, task_id, source);
        self.store
            .upsert(
                WORKLOGS_TABLE,
                serde_json::to_value(&segment).map_err(StoreError::Decode)?,
                None,
            )
            .await?;
        Ok(())
    }
}

fn decode_records(rows: Vec<Value>) -> Result<Vec<AttendanceRecord>, AttendanceError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(StoreError::Decode)
                .map_err(AttendanceError::Store)
        })
        .collect()
}

/// Strict `YYYY-MM-DD`; rejects unpadded forms chrono would accept.
fn parse_ymd(date: &str) -> Result<NaiveDate, AttendanceError> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AttendanceError::InvalidDate(date.to_string()))?;
    if parsed.to_string() != date {
        return Err(AttendanceError::InvalidDate(date.to_string()));
    }
    Ok(parsed)
}

/// Strict `YYYY-MM`, resolved to the first of the month.
fn parse_ym(month: &str) -> Result<NaiveDate, AttendanceError> {
    let start = format!("{}-01", month);
    let parsed = NaiveDate::parse_from_str(&start, "%Y-%m-%d")
        .map_err(|_| AttendanceError::InvalidMonth(month.to_string()))?;
    if parsed.to_string() != start {
        return Err(AttendanceError::InvalidMonth(month.to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ymd_strict() {
        assert!(parse_ymd("2024-05-01").is_ok());
        assert!(parse_ymd("2024-5-1").is_err());
        assert!(parse_ymd("2024/05/01").is_err());
        assert!(parse_ymd("2024-13-01").is_err());
        assert!(parse_ymd("").is_err());
    }

    #[test]
    fn test_parse_ym_strict() {
        assert_eq!(
            parse_ym("2024-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
        assert!(parse_ym("2024-5").is_err());
        assert!(parse_ym("2024-05-01").is_err());
        assert!(parse_ym("202405").is_err());
    }

    #[test]
    fn test_month_end_rolls_over_year() {
        let start = parse_ym("2024-12").unwrap();
        let end = start.checked_add_months(Months::new(1)).unwrap();
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }
}
