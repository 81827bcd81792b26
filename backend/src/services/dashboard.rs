//! Dashboard figures

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use shared::{local_day_start, AttendanceRecord};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::external::FileStorage;
use crate::services::attendance::AttendanceService;
use crate::services::stock::{MovementEntry, MovementQuery, StockService};

const DEFAULT_ACTIVITY_LIMIT: u32 = 10;

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_items: i64,
    pub total_stock: i64,
    pub low_stock_items: i64,
    pub stock_in_today: i64,
    pub stock_out_today: i64,
    pub attendance_today: Option<AttendanceRecord>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemTotals {
    total_items: i64,
    total_stock: i64,
    low_stock_items: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct MovementTotals {
    stock_in: i64,
    stock_out: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<u32>,
}

/// Dashboard service
#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
    offset: FixedOffset,
    stock: StockService,
    attendance: AttendanceService,
}

impl DashboardService {
    pub fn new(db: PgPool, storage: FileStorage, offset: FixedOffset) -> Self {
        Self {
            stock: StockService::new(db.clone(), storage.clone(), offset),
            attendance: AttendanceService::new(db.clone(), storage, offset),
            db,
            offset,
        }
    }

    pub async fn stats(&self, user_id: Uuid) -> AppResult<DashboardStats> {
        let items = sqlx::query_as::<_, ItemTotals>(
            r#"
            SELECT COUNT(*) AS total_items,
                   COALESCE(SUM(stock), 0)::BIGINT AS total_stock,
                   COUNT(*) FILTER (WHERE stock <= min_stock) AS low_stock_items
            FROM items
            WHERE deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let since = local_day_start(self.attendance.today(), self.offset);
        let movements = sqlx::query_as::<_, MovementTotals>(
            r#"
            SELECT COUNT(*) FILTER (WHERE movement_type = 'in') AS stock_in,
                   COUNT(*) FILTER (WHERE movement_type = 'out') AS stock_out
            FROM stock_movements
            WHERE created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&self.db)
        .await?;

        Ok(DashboardStats {
            total_items: items.total_items,
            total_stock: items.total_stock,
            low_stock_items: items.low_stock_items,
            stock_in_today: movements.stock_in,
            stock_out_today: movements.stock_out,
            attendance_today: self.attendance.today_record(user_id).await?,
        })
    }

    /// Latest ledger entries, today's by default
    pub async fn activities(&self, query: &ActivityQuery) -> AppResult<Vec<MovementEntry>> {
        let today = self.attendance.today();
        let movements = MovementQuery {
            date_from: Some(query.date_from.unwrap_or(today)),
            date_to: Some(query.date_to.unwrap_or(today)),
            per_page: Some(query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT)),
            ..Default::default()
        };
        Ok(self.stock.list(&movements).await?.data)
    }
}
