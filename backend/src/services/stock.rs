//! Stock ledger service
//!
//! `apply_movement` is the only way an item's on-hand quantity changes after
//! creation. It locks the item row, computes the new value with
//! [`shared::plan_movement`], and writes the item update and the ledger entry
//! in one transaction.

use chrono::{Days, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use shared::{
    local_day_start, plan_movement, Item, MovementType, PaginatedResponse, Pagination,
    StockChange, StockMovement,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::FileStorage;
use crate::services::item::{lock_item, ItemSnapshot, ITEM_COLUMNS};

const DEFAULT_PER_PAGE: u32 = 15;

const MOVEMENT_COLUMNS: &str = "m.id, m.item_id, m.item_name, m.item_sku, m.user_id, \
     m.movement_type, m.quantity, m.stock_before, m.stock_after, m.note, m.reference_number, \
     m.created_at";

// $1 item, $2 type, $3 from (inclusive), $4 to (exclusive)
const MOVEMENT_FILTERS: &str = r#"
    ($1::uuid IS NULL OR m.item_id = $1)
    AND ($2::stock_movement_type IS NULL OR m.movement_type = $2)
    AND ($3::timestamptz IS NULL OR m.created_at >= $3)
    AND ($4::timestamptz IS NULL OR m.created_at < $4)
"#;

/// A requested stock change
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub movement_type: MovementType,
    pub quantity: i64,
    pub note: Option<String>,
    pub reference_number: Option<String>,
}

/// Ledger listing filters
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MovementQuery {
    pub item_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Ledger entry with the acting user's name
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MovementEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub movement: StockMovement,
    pub user_name: Option<String>,
}

/// Stock ledger service
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
    storage: FileStorage,
    offset: FixedOffset,
}

impl StockService {
    pub fn new(db: PgPool, storage: FileStorage, offset: FixedOffset) -> Self {
        Self {
            db,
            storage,
            offset,
        }
    }

    pub async fn stock_in(
        &self,
        item_id: Uuid,
        actor_id: Uuid,
        quantity: i64,
        note: Option<String>,
        reference_number: Option<String>,
    ) -> AppResult<ItemSnapshot> {
        self.apply_movement(
            item_id,
            actor_id,
            MovementRequest {
                movement_type: MovementType::In,
                quantity,
                note,
                reference_number,
            },
        )
        .await
    }

    pub async fn stock_out(
        &self,
        item_id: Uuid,
        actor_id: Uuid,
        quantity: i64,
        note: Option<String>,
        reference_number: Option<String>,
    ) -> AppResult<ItemSnapshot> {
        self.apply_movement(
            item_id,
            actor_id,
            MovementRequest {
                movement_type: MovementType::Out,
                quantity,
                note,
                reference_number,
            },
        )
        .await
    }

    /// Apply one movement atomically.
    ///
    /// The item row stays locked from the read of `stock` until commit, so
    /// concurrent movements on the same item are serialized while movements on
    /// other items proceed. Trashed items are treated as missing.
    pub async fn apply_movement(
        &self,
        item_id: Uuid,
        actor_id: Uuid,
        request: MovementRequest,
    ) -> AppResult<ItemSnapshot> {
        if request.quantity <= 0 {
            return Err(AppError::InvalidQuantity);
        }
        let note = non_blank(request.note);
        let reference_number = non_blank(request.reference_number);

        let mut tx = self.db.begin().await.map_err(AppError::transaction)?;

        let item = lock_item(&mut *tx, item_id)
            .await
            .map_err(AppError::transaction)?
            .filter(|item| !item.lifecycle().is_trashed())
            .ok_or(AppError::ItemNotFound)?;

        let change = plan_movement(item.stock, request.movement_type, request.quantity)
            .map_err(|e| {
                tracing::warn!(
                    item_id = %item_id,
                    movement = %request.movement_type,
                    quantity = request.quantity,
                    stock = item.stock,
                    error = %e,
                    "stock movement rejected"
                );
                AppError::from(e)
            })?;

        let updated = sqlx::query_as::<_, Item>(&format!(
            "UPDATE items SET stock = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(change.after)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::transaction)?;

        let entry = insert_movement(
            &mut *tx,
            &updated,
            actor_id,
            &change,
            note.as_deref(),
            reference_number.as_deref(),
        )
        .await
        .map_err(AppError::transaction)?;

        tx.commit().await.map_err(AppError::transaction)?;

        tracing::info!(
            item_id = %item_id,
            movement_id = %entry.id,
            movement = %change.movement_type,
            quantity = change.quantity,
            delta = change.delta(),
            before = change.before,
            after = change.after,
            "stock movement recorded"
        );

        Ok(ItemSnapshot::new(updated, &self.storage))
    }

    /// Paginated ledger, newest first
    pub async fn list(&self, query: &MovementQuery) -> AppResult<PaginatedResponse<MovementEntry>> {
        let pagination = Pagination::from_query(query.page, query.per_page, DEFAULT_PER_PAGE);
        let (from, to) = self.date_bounds(query)?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM stock_movements m WHERE {}",
            MOVEMENT_FILTERS
        ))
        .bind(query.item_id)
        .bind(query.movement_type)
        .bind(from)
        .bind(to)
        .fetch_one(&self.db)
        .await?;

        let entries = sqlx::query_as::<_, MovementEntry>(&format!(
            r#"
            SELECT {}, u.name AS user_name
            FROM stock_movements m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE {}
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $5 OFFSET $6
            "#,
            MOVEMENT_COLUMNS, MOVEMENT_FILTERS
        ))
        .bind(query.item_id)
        .bind(query.movement_type)
        .bind(from)
        .bind(to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(entries, pagination, total.max(0) as u64))
    }

    /// Every entry matching the filters, newest first, for export
    pub async fn export(&self, query: &MovementQuery) -> AppResult<Vec<MovementEntry>> {
        let (from, to) = self.date_bounds(query)?;

        let entries = sqlx::query_as::<_, MovementEntry>(&format!(
            r#"
            SELECT {}, u.name AS user_name
            FROM stock_movements m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE {}
            ORDER BY m.created_at DESC, m.id DESC
            "#,
            MOVEMENT_COLUMNS, MOVEMENT_FILTERS
        ))
        .bind(query.item_id)
        .bind(query.movement_type)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Full history of one item, oldest first
    pub async fn item_history(&self, item_id: Uuid) -> AppResult<Vec<StockMovement>> {
        let entries = sqlx::query_as::<_, StockMovement>(&format!(
            r#"
            SELECT {}
            FROM stock_movements m
            WHERE m.item_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    fn date_bounds(
        &self,
        query: &MovementQuery,
    ) -> AppResult<(
        Option<chrono::DateTime<chrono::Utc>>,
        Option<chrono::DateTime<chrono::Utc>>,
    )> {
        if let (Some(from), Some(to)) = (query.date_from, query.date_to) {
            if from > to {
                return Err(AppError::validation(
                    "date_to",
                    "date_to must not be before date_from",
                ));
            }
        }

        let from = query.date_from.map(|d| local_day_start(d, self.offset));
        let to = query
            .date_to
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .map(|d| local_day_start(d, self.offset));
        Ok((from, to))
    }
}

/// Append a ledger entry for `change` on `item` inside the caller's transaction
pub(crate) async fn insert_movement(
    conn: &mut PgConnection,
    item: &Item,
    actor_id: Uuid,
    change: &StockChange,
    note: Option<&str>,
    reference_number: Option<&str>,
) -> Result<StockMovement, sqlx::Error> {
    sqlx::query_as::<_, StockMovement>(
        r#"
        INSERT INTO stock_movements (
            item_id, item_name, item_sku, user_id, movement_type,
            quantity, stock_before, stock_after, note, reference_number
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, item_id, item_name, item_sku, user_id, movement_type,
                  quantity, stock_before, stock_after, note, reference_number, created_at
        "#,
    )
    .bind(item.id)
    .bind(&item.name)
    .bind(&item.sku)
    .bind(actor_id)
    .bind(change.movement_type)
    .bind(change.quantity)
    .bind(change.before)
    .bind(change.after)
    .bind(note)
    .bind(reference_number)
    .fetch_one(conn)
    .await
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> StockService {
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/stokku_unused")
            .unwrap();
        let storage = FileStorage::new(&crate::config::StorageConfig {
            root: std::env::temp_dir(),
            public_url: "/storage".into(),
        });
        StockService::new(db, storage, FixedOffset::east_opt(8 * 3600).unwrap())
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_before_touching_the_database() {
        let err = service()
            .stock_in(Uuid::new_v4(), Uuid::new_v4(), 0, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidQuantity));
    }

    #[tokio::test]
    async fn inverted_date_range_is_rejected() {
        let query = MovementQuery {
            date_from: NaiveDate::from_ymd_opt(2026, 2, 1),
            date_to: NaiveDate::from_ymd_opt(2026, 1, 1),
            ..Default::default()
        };
        assert!(service().date_bounds(&query).is_err());
    }

    #[tokio::test]
    async fn date_to_is_inclusive_of_the_whole_local_day() {
        let query = MovementQuery {
            date_from: NaiveDate::from_ymd_opt(2026, 1, 10),
            date_to: NaiveDate::from_ymd_opt(2026, 1, 10),
            ..Default::default()
        };
        let (from, to) = service().date_bounds(&query).unwrap();
        let (from, to) = (from.unwrap(), to.unwrap());
        assert_eq!((to - from).num_hours(), 24);
        assert_eq!(from.to_rfc3339(), "2026-01-09T16:00:00+00:00");
    }

    #[test]
    fn blank_notes_are_dropped() {
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(Some(" PO-77 ".into())), Some("PO-77".into()));
    }
}
