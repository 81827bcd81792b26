//! Item service: CRUD, listings and the soft-delete lifecycle
//!
//! Stock is never written here except for the opening balance at creation,
//! which goes through the same ledger insert as every other movement.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    nullable, plan_movement, CatalogKind, Item, ItemScope, ItemSortColumn, MovementType,
    PaginatedResponse, Pagination, SortOrder,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::{FileStorage, StorageDir};
use crate::services::catalog::lock_catalog_entry;
use crate::services::stock::insert_movement;

pub(crate) const ITEM_COLUMNS: &str = "id, name, sku, stock, unit, category, min_stock, \
     description, price, supplier, image, is_active, deleted_at, created_at, updated_at";

const DEFAULT_PER_PAGE: u32 = 15;

// $1 search pattern, $2 category, $3 low stock, $4 active flag
const ITEM_FILTERS: &str = r#"
    ($1::text IS NULL OR name ILIKE $1 OR sku ILIKE $1)
    AND ($2::text IS NULL OR category = $2)
    AND ($3::bool IS NULL OR (stock <= min_stock) = $3)
    AND ($4::bool IS NULL OR is_active = $4)
"#;

/// Item as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct ItemSnapshot {
    #[serde(flatten)]
    pub item: Item,
    pub is_low_stock: bool,
    pub is_deleted: bool,
    pub image_url: Option<String>,
}

impl ItemSnapshot {
    pub fn new(item: Item, storage: &FileStorage) -> Self {
        let image_url = item
            .image
            .as_deref()
            .map(|name| storage.public_url(StorageDir::Items, name));
        Self {
            is_low_stock: item.is_low_stock(),
            is_deleted: ItemScope::Trashed.contains(item.lifecycle()),
            image_url,
            item,
        }
    }
}

/// Listing filters shared by the active and trashed views
#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub low_stock: Option<bool>,
    pub active: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Input for creating an item
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub stock: i64,
    #[validate(length(min = 1, max = 50, message = "Unit is required"))]
    pub unit: String,
    #[validate(length(min = 1, max = 100, message = "Category is required"))]
    pub category: String,
    #[serde(default)]
    pub min_stock: i64,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[validate(length(max = 255))]
    pub supplier: Option<String>,
    pub is_active: Option<bool>,
}

/// Input for updating an item. Stock is deliberately absent.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: Option<String>,
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub unit: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    pub min_stock: Option<i64>,
    /// `null` clears the field; a missing key leaves it unchanged
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    pub supplier: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Item service
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
    storage: FileStorage,
}

impl ItemService {
    pub fn new(db: PgPool, storage: FileStorage) -> Self {
        Self { db, storage }
    }

    /// Paginated listing of one lifecycle scope
    pub async fn list(
        &self,
        scope: ItemScope,
        query: &ItemQuery,
    ) -> AppResult<PaginatedResponse<ItemSnapshot>> {
        let sort = resolve_sort(scope, query.sort_by.as_deref())?;
        let order = query.sort_order.unwrap_or_default();
        let pagination = Pagination::from_query(query.page, query.per_page, DEFAULT_PER_PAGE);
        let search = search_pattern(query.search.as_deref());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM items WHERE {} AND {}",
            scope.predicate(),
            ITEM_FILTERS
        ))
        .bind(&search)
        .bind(&query.category)
        .bind(query.low_stock)
        .bind(query.active)
        .fetch_one(&self.db)
        .await?;

        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {} FROM items WHERE {} AND {} ORDER BY {} {}, id ASC LIMIT $5 OFFSET $6",
            ITEM_COLUMNS,
            scope.predicate(),
            ITEM_FILTERS,
            sort.column(),
            order.as_sql()
        ))
        .bind(&search)
        .bind(&query.category)
        .bind(query.low_stock)
        .bind(query.active)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(items, pagination, total.max(0) as u64)
            .map(|item| ItemSnapshot::new(item, &self.storage)))
    }

    /// Create an item, writing an opening ledger entry for any initial stock
    pub async fn create(&self, actor_id: Uuid, input: CreateItemInput) -> AppResult<ItemSnapshot> {
        input.validate()?;
        let sku = input.sku.trim().to_string();
        shared::validate_sku(&sku).map_err(|m| AppError::validation("sku", m))?;
        shared::validate_stock_level(input.stock).map_err(|m| AppError::validation("stock", m))?;
        shared::validate_stock_level(input.min_stock)
            .map_err(|m| AppError::validation("min_stock", m))?;
        shared::validate_price(input.price).map_err(|m| AppError::validation("price", m))?;
        self.ensure_sku_available(&sku, None).await?;

        let mut tx = self.db.begin().await.map_err(AppError::transaction)?;
        ensure_catalog_entries(&mut *tx, Some(&input.category), Some(&input.unit)).await?;

        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (name, sku, stock, unit, category, min_stock, description, price, supplier, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&sku)
        .bind(input.stock)
        .bind(&input.unit)
        .bind(&input.category)
        .bind(input.min_stock)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.supplier)
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::transaction)?;

        if item.stock > 0 {
            let change = plan_movement(0, MovementType::In, item.stock)?;
            insert_movement(&mut *tx, &item, actor_id, &change, Some("Opening balance"), None)
                .await
                .map_err(AppError::transaction)?;
        }

        tx.commit().await.map_err(AppError::transaction)?;

        tracing::info!(item_id = %item.id, sku = %item.sku, stock = item.stock, "item created");
        Ok(ItemSnapshot::new(item, &self.storage))
    }

    /// Active item by id
    pub async fn get(&self, item_id: Uuid) -> AppResult<ItemSnapshot> {
        let item = self.find_active(item_id).await?;
        Ok(ItemSnapshot::new(item, &self.storage))
    }

    /// Update descriptive fields of an active item
    pub async fn update(&self, item_id: Uuid, input: UpdateItemInput) -> AppResult<ItemSnapshot> {
        input.validate()?;
        if let Some(min_stock) = input.min_stock {
            shared::validate_stock_level(min_stock)
                .map_err(|m| AppError::validation("min_stock", m))?;
        }
        shared::validate_price(input.price.flatten())
            .map_err(|m| AppError::validation("price", m))?;
        if let Some(Some(supplier)) = &input.supplier {
            if supplier.chars().count() > 255 {
                return Err(AppError::validation(
                    "supplier",
                    "Supplier must be at most 255 characters",
                ));
            }
        }

        let current = self.find_active(item_id).await?;

        let sku = match input.sku.as_deref().map(str::trim) {
            Some(sku) if sku != current.sku => {
                shared::validate_sku(sku).map_err(|m| AppError::validation("sku", m))?;
                self.ensure_sku_available(sku, Some(item_id)).await?;
                Some(sku.to_string())
            }
            _ => None,
        };

        let mut tx = self.db.begin().await.map_err(AppError::transaction)?;
        ensure_catalog_entries(
            &mut *tx,
            input.category.as_deref().filter(|c| *c != current.category),
            input.unit.as_deref().filter(|u| *u != current.unit),
        )
        .await?;

        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items SET
                name = COALESCE($2, name),
                sku = COALESCE($3, sku),
                unit = COALESCE($4, unit),
                category = COALESCE($5, category),
                min_stock = COALESCE($6, min_stock),
                is_active = COALESCE($7, is_active),
                description = CASE WHEN $8::bool THEN $9::text ELSE description END,
                price = CASE WHEN $10::bool THEN $11::numeric ELSE price END,
                supplier = CASE WHEN $12::bool THEN $13::text ELSE supplier END,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(sku)
        .bind(&input.unit)
        .bind(&input.category)
        .bind(input.min_stock)
        .bind(input.is_active)
        .bind(input.description.is_some())
        .bind(input.description.as_ref().and_then(|d| d.as_deref()))
        .bind(input.price.is_some())
        .bind(input.price.flatten())
        .bind(input.supplier.is_some())
        .bind(input.supplier.as_ref().and_then(|s| s.as_deref()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::transaction)?
        .ok_or(AppError::ItemNotFound)?;
        tx.commit().await.map_err(AppError::transaction)?;

        tracing::info!(item_id = %item.id, "item updated");
        Ok(ItemSnapshot::new(item, &self.storage))
    }

    /// Replace the item's image, removing the previous file
    pub async fn replace_image(
        &self,
        item_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> AppResult<ItemSnapshot> {
        let extension = shared::validate_upload_extension(filename, shared::ITEM_IMAGE_EXTENSIONS)
            .map_err(|m| AppError::validation("image", m))?;
        if bytes.len() > shared::ITEM_IMAGE_MAX_BYTES {
            return Err(AppError::validation("image", "Image must be at most 2 MB"));
        }

        let current = self.find_active(item_id).await?;
        let stored = self
            .storage
            .save(StorageDir::Items, "", &extension, bytes)
            .await?;

        let updated = sqlx::query_as::<_, Item>(&format!(
            "UPDATE items SET image = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(&stored)
        .fetch_optional(&self.db)
        .await;

        let item = match updated {
            Ok(Some(item)) => item,
            Ok(None) => {
                // Trashed between the lookup and the update
                self.discard_image(item_id, &stored).await;
                return Err(AppError::ItemNotFound);
            }
            Err(e) => {
                self.discard_image(item_id, &stored).await;
                return Err(e.into());
            }
        };

        // The row already points at the new file, so a stale old file is
        // not a failure of this request
        if let Some(old) = current.image.as_deref() {
            self.discard_image(item_id, old).await;
        }

        tracing::info!(item_id = %item.id, image = %stored, "item image replaced");
        Ok(ItemSnapshot::new(item, &self.storage))
    }

    /// Active -> Trashed
    pub async fn soft_delete(&self, item_id: Uuid) -> AppResult<ItemSnapshot> {
        let mut tx = self.db.begin().await.map_err(AppError::transaction)?;

        let current = lock_item(&mut *tx, item_id)
            .await
            .map_err(AppError::transaction)?
            .ok_or(AppError::ItemNotFound)?;
        let next = current.lifecycle().soft_delete(Utc::now())?;

        let item = set_deleted_at(&mut *tx, item_id, next.deleted_at())
            .await
            .map_err(AppError::transaction)?;
        tx.commit().await.map_err(AppError::transaction)?;

        tracing::info!(item_id = %item.id, sku = %item.sku, "item moved to trash");
        Ok(ItemSnapshot::new(item, &self.storage))
    }

    /// Trashed -> Active
    pub async fn restore(&self, item_id: Uuid) -> AppResult<ItemSnapshot> {
        let mut tx = self.db.begin().await.map_err(AppError::transaction)?;

        let current = lock_item(&mut *tx, item_id)
            .await
            .map_err(AppError::transaction)?
            .ok_or(AppError::ItemNotFound)?;
        let next = current.lifecycle().restore()?;

        let item = set_deleted_at(&mut *tx, item_id, next.deleted_at())
            .await
            .map_err(AppError::transaction)?;
        tx.commit().await.map_err(AppError::transaction)?;

        tracing::info!(item_id = %item.id, sku = %item.sku, "item restored");
        Ok(ItemSnapshot::new(item, &self.storage))
    }

    /// Trashed -> Destroyed. Removes the row and its image file.
    ///
    /// Ledger entries are kept; they carry their own name and SKU snapshot.
    pub async fn force_delete(&self, item_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await.map_err(AppError::transaction)?;

        let item = lock_item(&mut *tx, item_id)
            .await
            .map_err(AppError::transaction)?
            .ok_or(AppError::ItemNotFound)?;
        item.lifecycle().ensure_destroyable()?;

        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(item_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::transaction)?;
        tx.commit().await.map_err(AppError::transaction)?;

        if let Some(image) = item.image.as_deref() {
            self.discard_image(item_id, image).await;
        }

        tracing::info!(item_id = %item_id, sku = %item.sku, "item permanently deleted");
        Ok(())
    }

    /// Remove an image file, logging instead of failing when it cannot be removed
    async fn discard_image(&self, item_id: Uuid, image: &str) {
        if let Err(e) = self.storage.delete_if_exists(StorageDir::Items, image).await {
            tracing::warn!(item_id = %item_id, image = %image, error = %e, "image file was not removed");
        }
    }

    async fn find_active(&self, item_id: Uuid) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(&format!(
            "SELECT {} FROM items WHERE id = $1 AND deleted_at IS NULL",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::ItemNotFound)
    }

    async fn ensure_sku_available(&self, sku: &str, except: Option<Uuid>) -> AppResult<()> {
        // Trashed rows count: a SKU is only freed by force-delete
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM items WHERE sku = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(sku)
        .bind(except)
        .fetch_one(&self.db)
        .await?;

        if taken {
            Err(AppError::DuplicateEntry("SKU".into()))
        } else {
            Ok(())
        }
    }
}

/// Check that the named catalog entries exist and keep them from being
/// deleted until the transaction ends
async fn ensure_catalog_entries(
    conn: &mut PgConnection,
    category: Option<&str>,
    unit: Option<&str>,
) -> AppResult<()> {
    for (kind, name) in [(CatalogKind::Category, category), (CatalogKind::Unit, unit)] {
        if let Some(name) = name {
            let exists = lock_catalog_entry(&mut *conn, kind, name)
                .await
                .map_err(AppError::transaction)?;
            if !exists {
                return Err(AppError::validation(
                    kind.item_column(),
                    format!("{} '{}' does not exist", kind.label(), name),
                ));
            }
        }
    }
    Ok(())
}

/// Load an item row and hold its lock until the transaction ends
pub(crate) async fn lock_item(
    conn: &mut PgConnection,
    item_id: Uuid,
) -> Result<Option<Item>, sqlx::Error> {
    sqlx::query_as::<_, Item>(&format!(
        "SELECT {} FROM items WHERE id = $1 FOR UPDATE",
        ITEM_COLUMNS
    ))
    .bind(item_id)
    .fetch_optional(conn)
    .await
}

async fn set_deleted_at(
    conn: &mut PgConnection,
    item_id: Uuid,
    deleted_at: Option<chrono::DateTime<Utc>>,
) -> Result<Item, sqlx::Error> {
    sqlx::query_as::<_, Item>(&format!(
        "UPDATE items SET deleted_at = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
        ITEM_COLUMNS
    ))
    .bind(item_id)
    .bind(deleted_at)
    .fetch_one(conn)
    .await
}

fn resolve_sort(scope: ItemScope, sort_by: Option<&str>) -> AppResult<ItemSortColumn> {
    let Some(value) = sort_by else {
        return Ok(ItemSortColumn::Name);
    };
    match ItemSortColumn::parse(value) {
        Some(ItemSortColumn::DeletedAt) if scope == ItemScope::Active => Err(
            AppError::validation("sort_by", "deleted_at is only sortable on trashed items"),
        ),
        Some(column) => Ok(column),
        None => Err(AppError::validation(
            "sort_by",
            format!("Cannot sort by '{}'", value),
        )),
    }
}

/// `%term%` for a non-blank search, with LIKE wildcards escaped
pub(crate) fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
}
