//! Dashboard handlers

use axum::extract::State;
use shared::{Action, ApiResponse};

use crate::error::AppResult;
use crate::extract::{Json, Query};
use crate::middleware::CurrentUser;
use crate::services::dashboard::{ActivityQuery, DashboardStats};
use crate::services::stock::MovementEntry;
use crate::services::DashboardService;
use crate::AppState;

fn dashboard_service(state: &AppState) -> DashboardService {
    DashboardService::new(
        state.db.clone(),
        state.storage.clone(),
        state.config.attendance.offset(),
    )
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    current_user.0.require(Action::ViewInventory)?;
    let stats = dashboard_service(&state)
        .stats(current_user.0.user_id)
        .await?;
    Ok(Json(ApiResponse::data(stats)))
}

pub async fn dashboard_activities(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<ApiResponse<Vec<MovementEntry>>>> {
    current_user.0.require(Action::ViewInventory)?;
    let activities = dashboard_service(&state).activities(&query).await?;
    Ok(Json(ApiResponse::data(activities)))
}
