//! Attendance service: one record per user per local calendar day

use chrono::{Days, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    attendance_date, Action, AttendanceRecord, AttendanceStatus, PaginatedResponse, Pagination,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::{FileStorage, StorageDir};
use crate::middleware::AuthUser;

const DEFAULT_PER_PAGE: u32 = 15;
const HISTORY_PER_PAGE: u32 = 7;
const HISTORY_DAYS: u32 = 30;
const MAX_HISTORY_DAYS: u32 = 365;

const RECORD_SELECT: &str = r#"
    SELECT a.id, a.user_id, u.name AS user_name, a.date, a.check_in, a.check_out, a.status,
           a.notes, a.latitude, a.longitude, a.work_minutes, a.check_in_photo,
           a.check_out_photo, a.created_at, a.updated_at
    FROM attendance_records a
    JOIN users u ON u.id = a.user_id
"#;

// $1 user, $2 from, $3 to, $4 status
const RECORD_FILTERS: &str = r#"
    ($1::uuid IS NULL OR a.user_id = $1)
    AND ($2::date IS NULL OR a.date >= $2)
    AND ($3::date IS NULL OR a.date <= $3)
    AND ($4::attendance_status IS NULL OR a.status = $4)
"#;

/// Uploaded photo as received from a multipart form
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct CheckInInput {
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub notes: Option<String>,
    pub photo: Option<PhotoUpload>,
}

#[derive(Debug, Default)]
pub struct CheckOutInput {
    pub notes: Option<String>,
    pub photo: Option<PhotoUpload>,
}

/// Attendance listing filters
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AttendanceQuery {
    pub user_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<u32>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Attendance service
#[derive(Clone)]
pub struct AttendanceService {
    db: PgPool,
    storage: FileStorage,
    offset: FixedOffset,
}

impl AttendanceService {
    pub fn new(db: PgPool, storage: FileStorage, offset: FixedOffset) -> Self {
        Self {
            db,
            storage,
            offset,
        }
    }

    /// Today's date in the attendance timezone
    pub fn today(&self) -> NaiveDate {
        attendance_date(Utc::now(), self.offset)
    }

    /// Record today's check-in. Fails if the user already checked in today.
    pub async fn check_in(&self, user_id: Uuid, input: CheckInInput) -> AppResult<AttendanceRecord> {
        shared::validate_coordinates(input.latitude, input.longitude)
            .map_err(|m| AppError::validation("latitude", m))?;
        validate_notes(input.notes.as_deref())?;

        let photo = self.store_photo("checkin_", input.photo.as_ref()).await?;
        let now = Utc::now();
        let date = attendance_date(now, self.offset);

        // The WHERE on the conflict arm turns a second check-in into a no-op
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO attendance_records
                (user_id, date, check_in, status, notes, latitude, longitude, check_in_photo)
            VALUES ($1, $2, $3, 'present', $4, $5, $6, $7)
            ON CONFLICT (user_id, date) DO UPDATE SET
                check_in = EXCLUDED.check_in,
                status = 'present',
                notes = COALESCE(EXCLUDED.notes, attendance_records.notes),
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                check_in_photo = EXCLUDED.check_in_photo,
                updated_at = NOW()
            WHERE attendance_records.check_in IS NULL
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(date)
        .bind(now)
        .bind(&input.notes)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(&photo)
        .fetch_optional(&self.db)
        .await?;

        let Some(id) = id else {
            self.discard_photo(photo.as_deref()).await;
            return Err(AppError::InvalidStateTransition(
                "You have already checked in today".into(),
            ));
        };

        tracing::info!(%user_id, %date, "checked in");
        self.find(id).await
    }

    /// Record today's check-out and the minutes worked
    pub async fn check_out(&self, user_id: Uuid, input: CheckOutInput) -> AppResult<AttendanceRecord> {
        validate_notes(input.notes.as_deref())?;

        let photo = self.store_photo("checkout_", input.photo.as_ref()).await?;
        let now = Utc::now();
        let date = attendance_date(now, self.offset);

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE attendance_records SET
                check_out = $3,
                work_minutes = GREATEST(0, FLOOR(EXTRACT(EPOCH FROM ($3 - check_in)) / 60))::int,
                check_out_photo = COALESCE($4, check_out_photo),
                notes = COALESCE($5, notes),
                updated_at = NOW()
            WHERE user_id = $1 AND date = $2 AND check_in IS NOT NULL AND check_out IS NULL
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(date)
        .bind(now)
        .bind(&photo)
        .bind(&input.notes)
        .fetch_optional(&self.db)
        .await?;

        let Some(id) = id else {
            self.discard_photo(photo.as_deref()).await;
            let existing = self.for_day(user_id, date).await?;
            let message = match existing {
                Some(r) if r.check_out.is_some() => "You have already checked out today",
                _ => "You have not checked in today",
            };
            return Err(AppError::InvalidStateTransition(message.into()));
        };

        tracing::info!(%user_id, %date, "checked out");
        self.find(id).await
    }

    /// The user's record for today, if any
    pub async fn today_record(&self, user_id: Uuid) -> AppResult<Option<AttendanceRecord>> {
        self.for_day(user_id, self.today()).await
    }

    /// Paginated records; staff only ever see their own
    pub async fn list(
        &self,
        viewer: &AuthUser,
        query: &AttendanceQuery,
    ) -> AppResult<PaginatedResponse<AttendanceRecord>> {
        let pagination = Pagination::from_query(query.page, query.per_page, DEFAULT_PER_PAGE);
        let user_id = scoped_user(viewer, query.user_id);
        self.page(user_id, query.date_from, query.date_to, query.status, pagination)
            .await
    }

    /// The caller's own records over the last `days` days
    pub async fn history(
        &self,
        user_id: Uuid,
        query: &HistoryQuery,
    ) -> AppResult<PaginatedResponse<AttendanceRecord>> {
        let days = query.days.unwrap_or(HISTORY_DAYS).clamp(1, MAX_HISTORY_DAYS);
        let today = self.today();
        let from = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(today);
        let pagination = Pagination::from_query(query.page, query.per_page, HISTORY_PER_PAGE);

        self.page(Some(user_id), Some(from), Some(today), None, pagination)
            .await
    }

    /// Every record matching the filters, for export
    pub async fn export(
        &self,
        viewer: &AuthUser,
        query: &AttendanceQuery,
    ) -> AppResult<Vec<AttendanceRecord>> {
        let user_id = scoped_user(viewer, query.user_id);
        let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "{} WHERE {} ORDER BY a.date DESC, u.name ASC, a.id ASC",
            RECORD_SELECT, RECORD_FILTERS
        ))
        .bind(user_id)
        .bind(query.date_from)
        .bind(query.date_to)
        .bind(query.status)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }

    async fn page(
        &self,
        user_id: Option<Uuid>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        status: Option<AttendanceStatus>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<AttendanceRecord>> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM attendance_records a WHERE {}",
            RECORD_FILTERS
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "{} WHERE {} ORDER BY a.date DESC, a.check_in DESC NULLS LAST, a.id ASC LIMIT $5 OFFSET $6",
            RECORD_SELECT, RECORD_FILTERS
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .bind(status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(records, pagination, total.max(0) as u64))
    }

    async fn find(&self, id: Uuid) -> AppResult<AttendanceRecord> {
        sqlx::query_as::<_, AttendanceRecord>(&format!("{} WHERE a.id = $1", RECORD_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Attendance record".into()))
    }

    async fn for_day(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Option<AttendanceRecord>> {
        let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "{} WHERE a.user_id = $1 AND a.date = $2",
            RECORD_SELECT
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.db)
        .await?;
        Ok(record)
    }

    async fn store_photo(
        &self,
        prefix: &str,
        photo: Option<&PhotoUpload>,
    ) -> AppResult<Option<String>> {
        let Some(photo) = photo else {
            return Ok(None);
        };
        let extension =
            shared::validate_upload_extension(&photo.filename, shared::ATTENDANCE_PHOTO_EXTENSIONS)
                .map_err(|m| AppError::validation("photo", m))?;
        if photo.bytes.len() > shared::ATTENDANCE_PHOTO_MAX_BYTES {
            return Err(AppError::validation("photo", "Photo must be at most 5 MB"));
        }

        let name = self
            .storage
            .save(StorageDir::Attendance, prefix, &extension, &photo.bytes)
            .await?;
        Ok(Some(name))
    }

    async fn discard_photo(&self, photo: Option<&str>) {
        if let Some(name) = photo {
            if let Err(e) = self.storage.delete_if_exists(StorageDir::Attendance, name).await {
                tracing::warn!(error = %e, photo = name, "failed to discard unused photo");
            }
        }
    }
}

/// Staff are pinned to themselves; supervisors may filter by any user
fn scoped_user(viewer: &AuthUser, requested: Option<Uuid>) -> Option<Uuid> {
    if viewer.role.can(Action::ViewAllAttendance) {
        requested
    } else {
        Some(viewer.user_id)
    }
}

fn validate_notes(notes: Option<&str>) -> AppResult<()> {
    match notes {
        Some(n) if n.chars().count() > 500 => Err(AppError::validation(
            "notes",
            "Notes must be at most 500 characters",
        )),
        _ => Ok(()),
    }
}
