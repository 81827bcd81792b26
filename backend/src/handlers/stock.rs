//! HTTP handlers for stock movements

use axum::{extract::State, http::header, response::IntoResponse};
use serde::Deserialize;
use serde_json::Value;
use shared::{parse_quantity, Action, ApiResponse, MovementType, PaginatedResponse};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::extract::{Json, Path, Query};
use crate::middleware::CurrentUser;
use crate::services::item::ItemSnapshot;
use crate::services::stock::{MovementEntry, MovementQuery, MovementRequest};
use crate::services::{ReportingService, StockService};
use crate::AppState;

/// Body of stock-in and stock-out requests
#[derive(Debug, Deserialize, Validate)]
pub struct StockRequest {
    /// Kept as raw JSON so that strings, fractions and negatives all map to
    /// the same invalid-quantity error
    #[serde(default)]
    pub quantity: Value,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
    #[validate(length(max = 100, message = "Reference number must be at most 100 characters"))]
    pub reference_number: Option<String>,
}

impl StockRequest {
    fn into_movement(self, movement_type: MovementType) -> AppResult<MovementRequest> {
        self.validate()?;
        let quantity = match &self.quantity {
            Value::Number(n) => parse_quantity(n)?,
            _ => return Err(AppError::InvalidQuantity),
        };
        Ok(MovementRequest {
            movement_type,
            quantity,
            note: self.note,
            reference_number: self.reference_number,
        })
    }
}

fn stock_service(state: &AppState) -> StockService {
    StockService::new(
        state.db.clone(),
        state.storage.clone(),
        state.config.attendance.offset(),
    )
}

async fn record(
    state: AppState,
    current_user: CurrentUser,
    item_id: Uuid,
    movement_type: MovementType,
    body: StockRequest,
) -> AppResult<Json<ApiResponse<ItemSnapshot>>> {
    current_user.0.require(Action::RecordStock)?;
    let request = body.into_movement(movement_type)?;
    let quantity = request.quantity;

    let item = stock_service(&state)
        .apply_movement(item_id, current_user.0.user_id, request)
        .await?;

    let message = match movement_type {
        MovementType::In => format!("Stock in of {} recorded", quantity),
        MovementType::Out => format!("Stock out of {} recorded", quantity),
    };
    Ok(Json(ApiResponse::with_message(message, item)))
}

/// Add stock to an item
pub async fn stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<StockRequest>,
) -> AppResult<Json<ApiResponse<ItemSnapshot>>> {
    record(state, current_user, item_id, MovementType::In, body).await
}

/// Remove stock from an item
pub async fn stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<StockRequest>,
) -> AppResult<Json<ApiResponse<ItemSnapshot>>> {
    record(state, current_user, item_id, MovementType::Out, body).await
}

/// Paginated ledger listing
pub async fn list_stock_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<MovementQuery>,
) -> AppResult<Json<PaginatedResponse<MovementEntry>>> {
    current_user.0.require(Action::ViewInventory)?;
    let movements = stock_service(&state).list(&query).await?;
    Ok(Json(movements))
}

/// Ledger listing as CSV
pub async fn export_stock_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<MovementQuery>,
) -> AppResult<impl IntoResponse> {
    current_user.0.require(Action::ViewInventory)?;
    let entries = stock_service(&state).export(&query).await?;
    let csv = ReportingService::movements_csv(&entries, state.config.attendance.offset())?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"stock_movements.csv\"",
            ),
        ],
        csv,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> AppResult<MovementRequest> {
        let body: StockRequest = serde_json::from_value(body).unwrap();
        body.into_movement(MovementType::Out)
    }

    #[test]
    fn accepts_positive_integers() {
        let movement = request(json!({"quantity": 120, "note": "Proyek A"})).unwrap();
        assert_eq!(movement.quantity, 120);
        assert_eq!(movement.note.as_deref(), Some("Proyek A"));
    }

    #[test]
    fn every_malformed_quantity_is_invalid_quantity() {
        for body in [
            json!({"quantity": 0}),
            json!({"quantity": -5}),
            json!({"quantity": 2.5}),
            json!({"quantity": "10"}),
            json!({"quantity": null}),
            json!({}),
        ] {
            assert!(
                matches!(request(body.clone()), Err(AppError::InvalidQuantity)),
                "{} should be rejected",
                body
            );
        }
    }

    #[test]
    fn long_reference_number_is_a_validation_error() {
        let result = request(json!({"quantity": 1, "reference_number": "R".repeat(101)}));
        assert!(
            matches!(result, Err(AppError::Validation { ref field, .. }) if field == "reference_number")
        );
    }
}
