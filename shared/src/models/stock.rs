//! Stock ledger models and the arithmetic behind every stock mutation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "stock_movement_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementType::In),
            "out" => Ok(MovementType::Out),
            other => Err(LedgerError::UnknownMovementType(other.to_string())),
        }
    }
}

/// One immutable ledger entry.
///
/// `item_name` and `item_sku` are captured when the entry is written so the
/// history stays readable after the item itself is destroyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub item_sku: String,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub note: Option<String>,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Errors raised by the stock arithmetic before anything is written
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Quantity must be a positive integer")]
    InvalidQuantity,

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("Stock would overflow")]
    Overflow,

    #[error("Unknown movement type: {0}")]
    UnknownMovementType(String),
}

/// The before/after pair a movement will produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub movement_type: MovementType,
    pub quantity: i64,
    pub before: i64,
    pub after: i64,
}

impl StockChange {
    /// Signed effect of this change on the on-hand quantity
    pub fn delta(&self) -> i64 {
        self.after - self.before
    }
}

/// Validate a requested quantity and compute the resulting on-hand value.
///
/// `out` movements never partially fulfil: if the request exceeds what is on
/// hand the whole movement is rejected.
pub fn plan_movement(
    before: i64,
    movement_type: MovementType,
    quantity: i64,
) -> Result<StockChange, LedgerError> {
    if quantity <= 0 {
        return Err(LedgerError::InvalidQuantity);
    }

    let after = match movement_type {
        MovementType::In => before.checked_add(quantity).ok_or(LedgerError::Overflow)?,
        MovementType::Out => {
            if quantity > before {
                return Err(LedgerError::InsufficientStock {
                    requested: quantity,
                    available: before,
                });
            }
            before - quantity
        }
    };

    Ok(StockChange {
        movement_type,
        quantity,
        before,
        after,
    })
}

/// Parse a JSON number into a ledger quantity.
///
/// Fractions, negatives, zero and values outside `i64` are all rejected with
/// the same error.
pub fn parse_quantity(value: &serde_json::Number) -> Result<i64, LedgerError> {
    match value.as_i64() {
        Some(q) if q > 0 => Ok(q),
        _ => Err(LedgerError::InvalidQuantity),
    }
}

/// Check that a sequence of entries (oldest first) forms an unbroken chain
/// ending at `on_hand`.
pub fn verify_chain(entries: &[StockMovement], on_hand: i64) -> bool {
    let linked = entries.windows(2).all(|w| w[0].stock_after == w[1].stock_before);
    let arithmetic = entries.iter().all(|e| {
        let expected = match e.movement_type {
            MovementType::In => e.stock_before + e.quantity,
            MovementType::Out => e.stock_before - e.quantity,
        };
        e.quantity > 0 && e.stock_after == expected && e.stock_after >= 0
    });
    let tail = entries.last().map_or(true, |e| e.stock_after == on_hand);

    linked && arithmetic && tail
}
