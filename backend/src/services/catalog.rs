//! Category and unit catalogs
//!
//! Items reference catalog entries by name, so deleting an entry is refused
//! while any item row still carries that name.

use serde::Deserialize;
use shared::{
    nullable, CatalogKind, CatalogOption, Category, PaginatedResponse, Pagination, SortOrder,
    Unit,
};
use sqlx::{postgres::PgRow, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::item::search_pattern;

const DEFAULT_PER_PAGE: u32 = 50;
const MAX_SYMBOL_LEN: usize = 10;
const MAX_DESCRIPTION_LEN: usize = 255;

/// Row type of a catalog table
pub trait CatalogRecord: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    const KIND: CatalogKind;
    const COLUMNS: &'static str;
    /// Extra columns matched by free-text search
    const SEARCH: &'static str;
}

impl CatalogRecord for Category {
    const KIND: CatalogKind = CatalogKind::Category;
    const COLUMNS: &'static str = "id, name, description, is_active, created_at, updated_at";
    const SEARCH: &'static str = "name ILIKE $1 OR description ILIKE $1";
}

impl CatalogRecord for Unit {
    const KIND: CatalogKind = CatalogKind::Unit;
    const COLUMNS: &'static str =
        "id, name, symbol, description, is_active, created_at, updated_at";
    const SEARCH: &'static str = "name ILIKE $1 OR symbol ILIKE $1 OR description ILIKE $1";
}

/// Catalog listing filters
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub active: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Create/update payload. `symbol` only applies to units.
///
/// On update an explicit `null` clears `symbol` or `description`.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub symbol: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl CatalogInput {
    fn symbol(&self) -> Option<&str> {
        self.symbol.as_ref().and_then(|s| s.as_deref())
    }

    fn description(&self) -> Option<&str> {
        self.description.as_ref().and_then(|d| d.as_deref())
    }

    fn validate_for(&self, kind: CatalogKind, creating: bool) -> AppResult<()> {
        match self.name.as_deref().map(str::trim) {
            None if creating => return Err(AppError::validation("name", "Name is required")),
            Some(name) if name.is_empty() || name.chars().count() > kind.max_name_len() => {
                return Err(AppError::validation(
                    "name",
                    format!("Name must be 1 to {} characters", kind.max_name_len()),
                ))
            }
            _ => {}
        }
        if kind == CatalogKind::Unit
            && self
                .symbol()
                .is_some_and(|s| s.chars().count() > MAX_SYMBOL_LEN)
        {
            return Err(AppError::validation(
                "symbol",
                format!("Symbol must be at most {} characters", MAX_SYMBOL_LEN),
            ));
        }
        if self
            .description()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return Err(AppError::validation(
                "description",
                format!("Description must be at most {} characters", MAX_DESCRIPTION_LEN),
            ));
        }
        Ok(())
    }
}

/// Catalog service
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list<T: CatalogRecord>(
        &self,
        query: &CatalogQuery,
    ) -> AppResult<PaginatedResponse<T>> {
        let sort = match query.sort_by.as_deref() {
            None | Some("name") => "name",
            Some("created_at") => "created_at",
            Some(other) => {
                return Err(AppError::validation(
                    "sort_by",
                    format!("Cannot sort by '{}'", other),
                ))
            }
        };
        let order = query.sort_order.unwrap_or_default();
        let pagination = Pagination::from_query(query.page, query.per_page, DEFAULT_PER_PAGE);
        let search = search_pattern(query.search.as_deref());
        let filters = format!(
            "deleted_at IS NULL AND ($1::text IS NULL OR {}) AND ($2::bool IS NULL OR is_active = $2)",
            T::SEARCH
        );

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            T::KIND.table(),
            filters
        ))
        .bind(&search)
        .bind(query.active)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, T>(&format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} {}, id ASC LIMIT $3 OFFSET $4",
            T::COLUMNS,
            T::KIND.table(),
            filters,
            sort,
            order.as_sql()
        ))
        .bind(&search)
        .bind(query.active)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(rows, pagination, total.max(0) as u64))
    }

    pub async fn get<T: CatalogRecord>(&self, id: Uuid) -> AppResult<T> {
        sqlx::query_as::<_, T>(&format!(
            "SELECT {} FROM {} WHERE id = $1 AND deleted_at IS NULL",
            T::COLUMNS,
            T::KIND.table()
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(T::KIND.label().to_string()))
    }

    pub async fn create<T: CatalogRecord>(&self, input: CatalogInput) -> AppResult<T> {
        input.validate_for(T::KIND, true)?;

        let row = sqlx::query_as::<_, T>(&format!(
            r#"
            INSERT INTO {} (name, {}description, is_active)
            VALUES ($1, {}$3, $4)
            RETURNING {}
            "#,
            T::KIND.table(),
            symbol_column(T::KIND),
            symbol_value(T::KIND),
            T::COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.symbol())
        .bind(input.description())
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(kind = T::KIND.label(), name = ?input.name, "catalog entry created");
        Ok(row)
    }

    /// Update an entry. Renames do not touch items that carry the old name.
    pub async fn update<T: CatalogRecord>(&self, id: Uuid, input: CatalogInput) -> AppResult<T> {
        input.validate_for(T::KIND, false)?;

        let symbol_set = match T::KIND {
            CatalogKind::Unit => "symbol = CASE WHEN $3::bool THEN $4::varchar ELSE symbol END,",
            CatalogKind::Category => "",
        };
        let row = sqlx::query_as::<_, T>(&format!(
            r#"
            UPDATE {} SET
                name = COALESCE($2, name),
                {}
                description = CASE WHEN $5::bool THEN $6::varchar ELSE description END,
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            T::KIND.table(),
            symbol_set,
            T::COLUMNS
        ))
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.symbol.is_some())
        .bind(input.symbol())
        .bind(input.description.is_some())
        .bind(input.description())
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(T::KIND.label().to_string()))?;

        tracing::info!(kind = T::KIND.label(), %id, "catalog entry updated");
        Ok(row)
    }

    /// Soft-delete an entry unless items still reference it by name.
    ///
    /// The entry row is locked `FOR UPDATE` for the count and the delete.
    /// Item writes hold a share lock on the entries they reference (see
    /// [`lock_catalog_entry`]), so an item created concurrently either lands
    /// before the count and blocks the delete, or sees the entry gone.
    pub async fn delete(&self, kind: CatalogKind, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await.map_err(AppError::transaction)?;

        let name = sqlx::query_scalar::<_, String>(&format!(
            "SELECT name FROM {} WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            kind.table()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::transaction)?
        .ok_or_else(|| AppError::NotFound(kind.label().to_string()))?;

        // Trashed items count too: restoring one must not resurrect a dangling name
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM items WHERE {} = $1",
            kind.item_column()
        ))
        .bind(&name)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::transaction)?;

        if count > 0 {
            tracing::warn!(kind = kind.label(), %name, count, "catalog delete blocked");
            return Err(AppError::ReferencedByItems {
                resource: kind.label().to_string(),
                count,
            });
        }

        sqlx::query(&format!(
            "UPDATE {} SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
            kind.table()
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::transaction)?;
        tx.commit().await.map_err(AppError::transaction)?;

        tracing::info!(kind = kind.label(), %name, "catalog entry deleted");
        Ok(())
    }

    /// Active entries for dropdowns, by name
    pub async fn options(&self, kind: CatalogKind) -> AppResult<Vec<CatalogOption>> {
        let symbol = match kind {
            CatalogKind::Unit => "symbol",
            CatalogKind::Category => "NULL::varchar AS symbol",
        };
        let options = sqlx::query_as::<_, CatalogOption>(&format!(
            "SELECT id, name, {} FROM {} WHERE is_active AND deleted_at IS NULL ORDER BY name ASC",
            symbol,
            kind.table()
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(options)
    }
}

/// Share-lock the live catalog entry with this name until the caller's
/// transaction ends. Returns false when no such entry exists.
pub(crate) async fn lock_catalog_entry(
    conn: &mut PgConnection,
    kind: CatalogKind,
    name: &str,
) -> Result<bool, sqlx::Error> {
    let id = sqlx::query_scalar::<_, Uuid>(&format!(
        "SELECT id FROM {} WHERE name = $1 AND deleted_at IS NULL FOR SHARE",
        kind.table()
    ))
    .bind(name)
    .fetch_optional(conn)
    .await?;
    Ok(id.is_some())
}

fn symbol_column(kind: CatalogKind) -> &'static str {
    match kind {
        CatalogKind::Unit => "symbol, ",
        CatalogKind::Category => "",
    }
}

fn symbol_value(kind: CatalogKind) -> &'static str {
    match kind {
        CatalogKind::Unit => "$2, ",
        CatalogKind::Category => "",
    }
}
