//! CSV export of the stock ledger and attendance records

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use shared::AttendanceRecord;

use crate::error::{AppError, AppResult};
use crate::services::stock::MovementEntry;

/// Byte order mark so spreadsheet tools detect UTF-8
const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Serialize)]
pub struct MovementCsvRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Item")]
    pub item: String,
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(rename = "Type")]
    pub movement_type: String,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
    #[serde(rename = "Stock Before")]
    pub stock_before: i64,
    #[serde(rename = "Stock After")]
    pub stock_after: i64,
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Note")]
    pub note: String,
    #[serde(rename = "Reference")]
    pub reference_number: String,
}

#[derive(Debug, Serialize)]
pub struct AttendanceCsvRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Check In")]
    pub check_in: String,
    #[serde(rename = "Check Out")]
    pub check_out: String,
    #[serde(rename = "Work Hours")]
    pub work_hours: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Notes")]
    pub notes: String,
}

/// Reporting service
pub struct ReportingService;

impl ReportingService {
    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }

    pub fn movements_csv(entries: &[MovementEntry], offset: FixedOffset) -> AppResult<String> {
        let rows: Vec<MovementCsvRow> = entries
            .iter()
            .map(|e| MovementCsvRow {
                date: local_timestamp(e.movement.created_at, offset),
                item: e.movement.item_name.clone(),
                sku: e.movement.item_sku.clone(),
                movement_type: e.movement.movement_type.to_string(),
                quantity: e.movement.quantity,
                stock_before: e.movement.stock_before,
                stock_after: e.movement.stock_after,
                user: e.user_name.clone().unwrap_or_default(),
                note: e.movement.note.clone().unwrap_or_default(),
                reference_number: e.movement.reference_number.clone().unwrap_or_default(),
            })
            .collect();
        Ok(format!("{}{}", UTF8_BOM, Self::export_to_csv(&rows)?))
    }

    pub fn attendance_csv(records: &[AttendanceRecord], offset: FixedOffset) -> AppResult<String> {
        let rows: Vec<AttendanceCsvRow> = records
            .iter()
            .map(|r| AttendanceCsvRow {
                date: r.date.format("%Y-%m-%d").to_string(),
                name: r.user_name.clone(),
                check_in: r.check_in.map(|t| local_time(t, offset)).unwrap_or_default(),
                check_out: r.check_out.map(|t| local_time(t, offset)).unwrap_or_default(),
                work_hours: r.work_hours_formatted().unwrap_or_default(),
                status: r.status.as_str().to_string(),
                notes: r.notes.clone().unwrap_or_default(),
            })
            .collect();
        Ok(format!("{}{}", UTF8_BOM, Self::export_to_csv(&rows)?))
    }
}

fn local_timestamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn local_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use shared::{AttendanceStatus, MovementType, StockMovement};
    use uuid::Uuid;

    fn plus8() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn movement_export_has_bom_header_and_local_time() {
        let entry = MovementEntry {
            movement: StockMovement {
                id: Uuid::new_v4(),
                item_id: Uuid::new_v4(),
                item_name: "Semen Portland".into(),
                item_sku: "SEM-001".into(),
                user_id: Uuid::new_v4(),
                movement_type: MovementType::Out,
                quantity: 120,
                stock_before: 150,
                stock_after: 30,
                note: Some("Proyek, gedung A".into()),
                reference_number: None,
                created_at: Utc.with_ymd_and_hms(2026, 1, 10, 1, 30, 0).unwrap(),
            },
            user_name: Some("Budi".into()),
        };

        let csv = ReportingService::movements_csv(&[entry], plus8()).unwrap();
        assert!(csv.starts_with(UTF8_BOM));

        let mut lines = csv.trim_start_matches(UTF8_BOM).lines();
        assert_eq!(
            lines.next().unwrap(),
            "Date,Item,SKU,Type,Quantity,Stock Before,Stock After,User,Note,Reference"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2026-01-10 09:30:00,Semen Portland,SEM-001,out,120,150,30,Budi,\"Proyek, gedung A\","
        );
    }

    #[test]
    fn attendance_export_formats_hours() {
        let check_in = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Siti".into(),
            date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            check_in: Some(check_in),
            check_out: Some(check_in + chrono::Duration::minutes(485)),
            status: AttendanceStatus::Present,
            notes: None,
            latitude: None,
            longitude: None,
            work_minutes: Some(485),
            check_in_photo: None,
            check_out_photo: None,
            created_at: check_in,
            updated_at: check_in,
        };

        let csv = ReportingService::attendance_csv(&[record], plus8()).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row, "2026-01-10,Siti,08:00:00,16:05:00,8h 05m,present,");
    }
}
