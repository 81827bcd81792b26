//! User management and profile handlers

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
};
use shared::{Action, ApiResponse, PaginatedResponse};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extract::{Json, Path, Query};
use crate::handlers::form::FormData;
use crate::middleware::CurrentUser;
use crate::services::user::{CreateUserInput, ProfileInput, UpdateUserInput, UserProfile, UserQuery};
use crate::services::UserService;
use crate::AppState;

fn user_service(state: &AppState) -> UserService {
    UserService::new(state.db.clone(), state.storage.clone())
}

pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<PaginatedResponse<UserProfile>>> {
    current_user.0.require(Action::ManageUsers)?;
    let users = user_service(&state).list(&query).await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserProfile>>)> {
    current_user.0.require(Action::ManageUsers)?;
    let user = user_service(&state).create(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("User created successfully", user)),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    current_user.0.require(Action::ManageUsers)?;
    let user = user_service(&state).get(user_id).await?;
    Ok(Json(ApiResponse::data(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    current_user.0.require(Action::ManageUsers)?;
    let user = user_service(&state)
        .update(current_user.0.user_id, user_id, input)
        .await?;
    Ok(Json(ApiResponse::with_message("User updated successfully", user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.0.require(Action::ManageUsers)?;
    user_service(&state)
        .delete(current_user.0.user_id, user_id)
        .await?;
    Ok(Json(ApiResponse::message("User deleted successfully")))
}

pub async fn toggle_user_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    current_user.0.require(Action::ManageUsers)?;
    let user = user_service(&state)
        .toggle_status(current_user.0.user_id, user_id)
        .await?;
    let message = if user.user.is_active {
        "User activated successfully"
    } else {
        "User deactivated successfully"
    };
    Ok(Json(ApiResponse::with_message(message, user)))
}

/// The caller's own profile
pub async fn show_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let profile = user_service(&state).get(current_user.0.user_id).await?;
    Ok(Json(ApiResponse::data(profile)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ProfileInput>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let profile = user_service(&state)
        .update_profile(current_user.0.user_id, input)
        .await?;
    Ok(Json(ApiResponse::with_message("Profile updated successfully", profile)))
}

/// Upload or replace the caller's avatar (`avatar` form field)
pub async fn upload_avatar(
    State(state): State<AppState>,
    current_user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let mut form = FormData::read(multipart).await?;
    let avatar = form
        .take_file("avatar")
        .ok_or_else(|| AppError::validation("avatar", "An avatar image is required"))?;

    let profile = user_service(&state)
        .replace_avatar(current_user.0.user_id, &avatar.filename, &avatar.bytes)
        .await?;
    Ok(Json(ApiResponse::with_message("Avatar uploaded successfully", profile)))
}

/// Tokens are stateless; the client discards its copy
pub async fn logout(current_user: CurrentUser) -> Json<ApiResponse<()>> {
    tracing::info!(user_id = %current_user.0.user_id, "user logged out");
    Json(ApiResponse::message("Logged out successfully"))
}
