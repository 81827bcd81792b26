//! Attendance models

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attendance status of a day record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "attendance_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

/// One row per user per calendar date
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    /// Minutes between check-in and check-out
    pub work_minutes: Option<i32>,
    pub check_in_photo: Option<String>,
    pub check_out_photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn work_hours_formatted(&self) -> Option<String> {
        self.work_minutes.map(format_work_minutes)
    }
}

/// Render a duration in minutes as `"8h 05m"`
pub fn format_work_minutes(minutes: i32) -> String {
    let minutes = minutes.max(0);
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

/// Calendar date of `now` in the attendance timezone
pub fn attendance_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Instant at which `date` begins in the given offset
pub fn local_day_start(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (midnight - chrono::Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_work_minutes() {
        assert_eq!(format_work_minutes(0), "0h 00m");
        assert_eq!(format_work_minutes(485), "8h 05m");
        assert_eq!(format_work_minutes(-10), "0h 00m");
    }

    #[test]
    fn local_day_start_is_previous_utc_evening() {
        let plus8 = FixedOffset::east_opt(8 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 1, 11).unwrap();
        assert_eq!(
            local_day_start(date, plus8),
            Utc.with_ymd_and_hms(2026, 1, 10, 16, 0, 0).unwrap()
        );
    }

    #[test]
    fn attendance_date_follows_offset() {
        // 17:30 UTC is already the next day at UTC+8
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 17, 30, 0).unwrap();
        let plus8 = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(
            attendance_date(now, plus8),
            NaiveDate::from_ymd_opt(2026, 1, 11).unwrap()
        );
        assert_eq!(
            attendance_date(now, FixedOffset::east_opt(0).unwrap()),
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()
        );
    }
}
