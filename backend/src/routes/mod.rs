//! Route definitions for Stokku

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Room for a 2 MiB image plus multipart framing
const ITEM_IMAGE_BODY_LIMIT: usize = 3 * 1024 * 1024;
/// Room for a 5 MiB photo plus the other form fields
const ATTENDANCE_BODY_LIMIT: usize = 6 * 1024 * 1024;
/// Room for a 2 MiB avatar plus multipart framing
const AVATAR_BODY_LIMIT: usize = 3 * 1024 * 1024;

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Public
        .route("/health", get(handlers::health_check))
        .route("/login", post(handlers::login))
        // Everything else requires a bearer token
        .merge(protected_routes(state))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::me))
        .route("/logout", post(handlers::logout))
        .merge(profile_routes())
        .merge(user_routes())
        .merge(dashboard_routes())
        .merge(item_routes())
        .merge(stock_routes())
        .merge(catalog_routes())
        .merge(attendance_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn profile_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(handlers::show_profile).put(handlers::update_profile),
        )
        .route(
            "/profile/avatar",
            post(handlers::upload_avatar).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
}

/// Account management, admin only
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/users/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route("/users/:id/toggle-status", post(handlers::toggle_user_status))
}

fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/stats", get(handlers::dashboard_stats))
        .route("/dashboard/activities", get(handlers::dashboard_activities))
}

/// Items and their lifecycle
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(handlers::list_items).post(handlers::create_item))
        .route(
            "/items/:id",
            get(handlers::get_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
        .route(
            "/items/:id/image",
            post(handlers::upload_item_image).layer(DefaultBodyLimit::max(ITEM_IMAGE_BODY_LIMIT)),
        )
        .route("/items/:id/movements", get(handlers::item_movements))
        .route("/items-trashed", get(handlers::list_trashed_items))
        .route("/items/:id/restore", post(handlers::restore_item))
        .route("/items/:id/force-delete", delete(handlers::force_delete_item))
}

/// Stock ledger
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/items/:id/stock-in", post(handlers::stock_in))
        .route("/items/:id/stock-out", post(handlers::stock_out))
        .route("/stock-movements", get(handlers::list_stock_movements))
        .route("/stock-movements/export", get(handlers::export_stock_movements))
}

/// Category and unit catalogs
fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/categories/:id",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route("/categories-options", get(handlers::category_options))
        .route("/units", get(handlers::list_units).post(handlers::create_unit))
        .route(
            "/units/:id",
            get(handlers::get_unit)
                .put(handlers::update_unit)
                .delete(handlers::delete_unit),
        )
        .route("/units-options", get(handlers::unit_options))
}

fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/attendance", get(handlers::list_attendance))
        .route(
            "/attendance/check-in",
            post(handlers::check_in).layer(DefaultBodyLimit::max(ATTENDANCE_BODY_LIMIT)),
        )
        .route(
            "/attendance/check-out",
            post(handlers::check_out).layer(DefaultBodyLimit::max(ATTENDANCE_BODY_LIMIT)),
        )
        .route("/attendance/today", get(handlers::today_attendance))
        .route("/attendance/history", get(handlers::attendance_history))
        .route("/attendance/export", get(handlers::export_attendance))
}
