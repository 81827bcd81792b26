//! Reference catalogs (categories and units) referenced by items by name

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Item category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Unit of measure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog kinds; each maps to its own table and to one item column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Category,
    Unit,
}

impl CatalogKind {
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Category => "categories",
            CatalogKind::Unit => "units",
        }
    }

    /// Item column holding the denormalized catalog name
    pub fn item_column(&self) -> &'static str {
        match self {
            CatalogKind::Category => "category",
            CatalogKind::Unit => "unit",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CatalogKind::Category => "Category",
            CatalogKind::Unit => "Unit",
        }
    }

    pub fn max_name_len(&self) -> usize {
        match self {
            CatalogKind::Category => 100,
            CatalogKind::Unit => 50,
        }
    }
}

/// Dropdown entry for catalog option lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CatalogOption {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}
