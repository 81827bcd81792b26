//! Item models and the soft-delete lifecycle

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Current-state record for one stock-keeping unit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub stock: i64,
    pub unit: String,
    pub category: String,
    pub min_stock: i64,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub supplier: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn is_low_stock(&self) -> bool {
        is_low_stock(self.stock, self.min_stock)
    }

    pub fn lifecycle(&self) -> ItemLifecycle {
        ItemLifecycle::from_deleted_at(self.deleted_at)
    }
}

/// An item is low on stock when on-hand is at or below its reorder threshold
pub fn is_low_stock(stock: i64, min_stock: i64) -> bool {
    stock <= min_stock
}

/// Visibility state of a persisted item.
///
/// The third state, destroyed, has no representation: a destroyed item no
/// longer has a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLifecycle {
    Active,
    Trashed { deleted_at: DateTime<Utc> },
}

/// Lifecycle transition attempted from the wrong state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Item is already in the trash")]
    AlreadyDeleted,

    #[error("Item is not in the trash")]
    NotTrashed,
}

impl ItemLifecycle {
    pub fn from_deleted_at(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            Some(deleted_at) => ItemLifecycle::Trashed { deleted_at },
            None => ItemLifecycle::Active,
        }
    }

    pub fn is_trashed(&self) -> bool {
        matches!(self, ItemLifecycle::Trashed { .. })
    }

    /// Active -> Trashed
    pub fn soft_delete(self, now: DateTime<Utc>) -> Result<Self, LifecycleError> {
        match self {
            ItemLifecycle::Active => Ok(ItemLifecycle::Trashed { deleted_at: now }),
            ItemLifecycle::Trashed { .. } => Err(LifecycleError::AlreadyDeleted),
        }
    }

    /// Trashed -> Active
    pub fn restore(self) -> Result<Self, LifecycleError> {
        match self {
            ItemLifecycle::Trashed { .. } => Ok(ItemLifecycle::Active),
            ItemLifecycle::Active => Err(LifecycleError::NotTrashed),
        }
    }

    /// Trashed -> Destroyed. Active items must go through the trash first.
    pub fn ensure_destroyable(self) -> Result<(), LifecycleError> {
        match self {
            ItemLifecycle::Trashed { .. } => Ok(()),
            ItemLifecycle::Active => Err(LifecycleError::NotTrashed),
        }
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ItemLifecycle::Active => None,
            ItemLifecycle::Trashed { deleted_at } => Some(*deleted_at),
        }
    }
}

/// Which lifecycle state a listing query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemScope {
    Active,
    Trashed,
}

impl ItemScope {
    /// SQL predicate selecting rows in this scope
    pub fn predicate(&self) -> &'static str {
        match self {
            ItemScope::Active => "deleted_at IS NULL",
            ItemScope::Trashed => "deleted_at IS NOT NULL",
        }
    }

    pub fn contains(&self, lifecycle: ItemLifecycle) -> bool {
        match self {
            ItemScope::Active => !lifecycle.is_trashed(),
            ItemScope::Trashed => lifecycle.is_trashed(),
        }
    }
}

/// Columns an item listing may be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSortColumn {
    Name,
    Sku,
    Stock,
    MinStock,
    Category,
    Unit,
    Price,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

impl ItemSortColumn {
    pub fn parse(value: &str) -> Option<Self> {
        let column = match value {
            "name" => ItemSortColumn::Name,
            "sku" => ItemSortColumn::Sku,
            "stock" => ItemSortColumn::Stock,
            "min_stock" => ItemSortColumn::MinStock,
            "category" => ItemSortColumn::Category,
            "unit" => ItemSortColumn::Unit,
            "price" => ItemSortColumn::Price,
            "created_at" => ItemSortColumn::CreatedAt,
            "updated_at" => ItemSortColumn::UpdatedAt,
            "deleted_at" => ItemSortColumn::DeletedAt,
            _ => return None,
        };
        Some(column)
    }

    pub fn column(&self) -> &'static str {
        match self {
            ItemSortColumn::Name => "name",
            ItemSortColumn::Sku => "sku",
            ItemSortColumn::Stock => "stock",
            ItemSortColumn::MinStock => "min_stock",
            ItemSortColumn::Category => "category",
            ItemSortColumn::Unit => "unit",
            ItemSortColumn::Price => "price",
            ItemSortColumn::CreatedAt => "created_at",
            ItemSortColumn::UpdatedAt => "updated_at",
            ItemSortColumn::DeletedAt => "deleted_at",
        }
    }
}
