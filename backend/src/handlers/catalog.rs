//! HTTP handlers for categories and units

use axum::{extract::State, http::StatusCode};
use shared::{Action, ApiResponse, CatalogKind, CatalogOption, Category, PaginatedResponse, Unit};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::{Json, Path, Query};
use crate::middleware::CurrentUser;
use crate::services::catalog::{CatalogInput, CatalogQuery, CatalogRecord};
use crate::services::CatalogService;
use crate::AppState;

async fn list<T: CatalogRecord>(
    state: AppState,
    current_user: CurrentUser,
    query: CatalogQuery,
) -> AppResult<Json<PaginatedResponse<T>>> {
    current_user.0.require(Action::ViewInventory)?;
    let rows = CatalogService::new(state.db).list::<T>(&query).await?;
    Ok(Json(rows))
}

async fn create<T: CatalogRecord>(
    state: AppState,
    current_user: CurrentUser,
    input: CatalogInput,
) -> AppResult<(StatusCode, Json<ApiResponse<T>>)> {
    current_user.0.require(Action::ManageCatalogs)?;
    let row = CatalogService::new(state.db).create::<T>(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            format!("{} created successfully", T::KIND.label()),
            row,
        )),
    ))
}

async fn update<T: CatalogRecord>(
    state: AppState,
    current_user: CurrentUser,
    id: Uuid,
    input: CatalogInput,
) -> AppResult<Json<ApiResponse<T>>> {
    current_user.0.require(Action::ManageCatalogs)?;
    let row = CatalogService::new(state.db).update::<T>(id, input).await?;
    Ok(Json(ApiResponse::with_message(
        format!("{} updated successfully", T::KIND.label()),
        row,
    )))
}

async fn delete(
    state: AppState,
    current_user: CurrentUser,
    kind: CatalogKind,
    id: Uuid,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.0.require(Action::ManageCatalogs)?;
    CatalogService::new(state.db).delete(kind, id).await?;
    Ok(Json(ApiResponse::message(format!(
        "{} deleted successfully",
        kind.label()
    ))))
}

async fn options(
    state: AppState,
    current_user: CurrentUser,
    kind: CatalogKind,
) -> AppResult<Json<ApiResponse<Vec<CatalogOption>>>> {
    current_user.0.require(Action::ViewInventory)?;
    let options = CatalogService::new(state.db).options(kind).await?;
    Ok(Json(ApiResponse::data(options)))
}

// ============================================================================
// Categories
// ============================================================================

pub async fn list_categories(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<CatalogQuery>,
) -> AppResult<Json<PaginatedResponse<Category>>> {
    list::<Category>(state, current_user, query).await
}

pub async fn create_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CatalogInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    create::<Category>(state, current_user, input).await
}

pub async fn get_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Category>>> {
    current_user.0.require(Action::ViewInventory)?;
    let category = CatalogService::new(state.db).get::<Category>(id).await?;
    Ok(Json(ApiResponse::data(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CatalogInput>,
) -> AppResult<Json<ApiResponse<Category>>> {
    update::<Category>(state, current_user, id, input).await
}

pub async fn delete_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    delete(state, current_user, CatalogKind::Category, id).await
}

pub async fn category_options(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<CatalogOption>>>> {
    options(state, current_user, CatalogKind::Category).await
}

// ============================================================================
// Units
// ============================================================================

pub async fn list_units(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<CatalogQuery>,
) -> AppResult<Json<PaginatedResponse<Unit>>> {
    list::<Unit>(state, current_user, query).await
}

pub async fn create_unit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CatalogInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Unit>>)> {
    create::<Unit>(state, current_user, input).await
}

pub async fn get_unit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Unit>>> {
    current_user.0.require(Action::ViewInventory)?;
    let unit = CatalogService::new(state.db).get::<Unit>(id).await?;
    Ok(Json(ApiResponse::data(unit)))
}

pub async fn update_unit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CatalogInput>,
) -> AppResult<Json<ApiResponse<Unit>>> {
    update::<Unit>(state, current_user, id, input).await
}

pub async fn delete_unit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    delete(state, current_user, CatalogKind::Unit, id).await
}

pub async fn unit_options(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<CatalogOption>>>> {
    options(state, current_user, CatalogKind::Unit).await
}
