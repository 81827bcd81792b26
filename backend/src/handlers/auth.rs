//! Authentication handlers

use axum::extract::State;
use serde::Deserialize;
use shared::{ApiResponse, User};

use crate::error::AppResult;
use crate::extract::Json;
use crate::middleware::CurrentUser;
use crate::services::auth::LoginResult;
use crate::services::AuthService;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResult>>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let result = auth_service.login(&body.email, &body.password).await?;
    Ok(Json(ApiResponse::with_message("Login successful", result)))
}

/// Current user profile
pub async fn me(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let user = auth_service.me(current_user.0.user_id).await?;
    Ok(Json(ApiResponse::data(user)))
}
