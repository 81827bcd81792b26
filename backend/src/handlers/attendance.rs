//! Attendance handlers

use axum::{
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
};
use shared::{ApiResponse, AttendanceRecord, PaginatedResponse};

use crate::error::AppResult;
use crate::extract::{Json, Query};
use crate::handlers::form::FormData;
use crate::middleware::CurrentUser;
use crate::services::attendance::{AttendanceQuery, CheckInInput, CheckOutInput, HistoryQuery};
use crate::services::{AttendanceService, ReportingService};
use crate::AppState;

fn attendance_service(state: &AppState) -> AttendanceService {
    AttendanceService::new(
        state.db.clone(),
        state.storage.clone(),
        state.config.attendance.offset(),
    )
}

/// Check in for today (multipart: latitude, longitude, notes, photo)
pub async fn check_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<AttendanceRecord>>> {
    let mut form = FormData::read(multipart).await?;
    let input = CheckInInput {
        latitude: form.decimal("latitude")?,
        longitude: form.decimal("longitude")?,
        notes: form.text("notes"),
        photo: form.take_file("photo"),
    };

    let record = attendance_service(&state)
        .check_in(current_user.0.user_id, input)
        .await?;
    Ok(Json(ApiResponse::with_message("Checked in successfully", record)))
}

/// Check out for today (multipart: notes, photo)
pub async fn check_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<AttendanceRecord>>> {
    let mut form = FormData::read(multipart).await?;
    let input = CheckOutInput {
        notes: form.text("notes"),
        photo: form.take_file("photo"),
    };

    let record = attendance_service(&state)
        .check_out(current_user.0.user_id, input)
        .await?;
    Ok(Json(ApiResponse::with_message("Checked out successfully", record)))
}

pub async fn list_attendance(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<AttendanceQuery>,
) -> AppResult<Json<PaginatedResponse<AttendanceRecord>>> {
    let records = attendance_service(&state)
        .list(&current_user.0, &query)
        .await?;
    Ok(Json(records))
}

pub async fn today_attendance(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Option<AttendanceRecord>>>> {
    let record = attendance_service(&state)
        .today_record(current_user.0.user_id)
        .await?;
    Ok(Json(ApiResponse::data(record)))
}

pub async fn attendance_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<PaginatedResponse<AttendanceRecord>>> {
    let records = attendance_service(&state)
        .history(current_user.0.user_id, &query)
        .await?;
    Ok(Json(records))
}

/// Attendance as CSV; staff export only their own rows
pub async fn export_attendance(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<AttendanceQuery>,
) -> AppResult<impl IntoResponse> {
    let records = attendance_service(&state)
        .export(&current_user.0, &query)
        .await?;
    let csv = ReportingService::attendance_csv(&records, state.config.attendance.offset())?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"attendance.csv\"",
            ),
        ],
        csv,
    ))
}
