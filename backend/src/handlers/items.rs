//! HTTP handlers for items and the item lifecycle

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
};
use shared::{Action, ApiResponse, ItemScope, PaginatedResponse, StockMovement};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extract::{Json, Path, Query};
use crate::handlers::form::FormData;
use crate::middleware::CurrentUser;
use crate::services::item::{CreateItemInput, ItemQuery, ItemSnapshot, UpdateItemInput};
use crate::services::{ItemService, StockService};
use crate::AppState;

fn item_service(state: &AppState) -> ItemService {
    ItemService::new(state.db.clone(), state.storage.clone())
}

/// List active items
pub async fn list_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<PaginatedResponse<ItemSnapshot>>> {
    current_user.0.require(Action::ViewInventory)?;
    let items = item_service(&state).list(ItemScope::Active, &query).await?;
    Ok(Json(items))
}

/// List trashed items
pub async fn list_trashed_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<PaginatedResponse<ItemSnapshot>>> {
    current_user.0.require(Action::ManageItems)?;
    let items = item_service(&state).list(ItemScope::Trashed, &query).await?;
    Ok(Json(items))
}

/// Create an item
pub async fn create_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateItemInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<ItemSnapshot>>)> {
    current_user.0.require(Action::ManageItems)?;
    let item = item_service(&state)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Item created successfully", item)),
    ))
}

/// Get an active item
pub async fn get_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ItemSnapshot>>> {
    current_user.0.require(Action::ViewInventory)?;
    let item = item_service(&state).get(item_id).await?;
    Ok(Json(ApiResponse::data(item)))
}

/// Update an item's descriptive fields
pub async fn update_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<ApiResponse<ItemSnapshot>>> {
    current_user.0.require(Action::ManageItems)?;
    let item = item_service(&state).update(item_id, input).await?;
    Ok(Json(ApiResponse::with_message("Item updated successfully", item)))
}

/// Upload or replace an item's image (`image` form field)
pub async fn upload_item_image(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<ItemSnapshot>>> {
    current_user.0.require(Action::ManageItems)?;
    let mut form = FormData::read(multipart).await?;
    let image = form
        .take_file("image")
        .ok_or_else(|| AppError::validation("image", "An image file is required"))?;

    let item = item_service(&state)
        .replace_image(item_id, &image.filename, &image.bytes)
        .await?;
    Ok(Json(ApiResponse::with_message("Image uploaded successfully", item)))
}

/// Move an item to the trash
pub async fn delete_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ItemSnapshot>>> {
    current_user.0.require(Action::ManageItems)?;
    let item = item_service(&state).soft_delete(item_id).await?;
    Ok(Json(ApiResponse::with_message("Item moved to trash", item)))
}

/// Restore a trashed item
pub async fn restore_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ItemSnapshot>>> {
    current_user.0.require(Action::ManageItems)?;
    let item = item_service(&state).restore(item_id).await?;
    Ok(Json(ApiResponse::with_message("Item restored successfully", item)))
}

/// Permanently delete a trashed item
pub async fn force_delete_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.0.require(Action::DestroyItems)?;
    item_service(&state).force_delete(item_id).await?;
    Ok(Json(ApiResponse::message("Item permanently deleted")))
}

/// Ledger history of one item, oldest first
pub async fn item_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<StockMovement>>>> {
    current_user.0.require(Action::ViewInventory)?;
    let service = StockService::new(
        state.db.clone(),
        state.storage.clone(),
        state.config.attendance.offset(),
    );
    let history = service.item_history(item_id).await?;
    Ok(Json(ApiResponse::data(history)))
}
