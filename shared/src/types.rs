//! Common types used across the platform

use serde::{Deserialize, Deserializer, Serialize};

/// Largest page size a listing will honour
pub const MAX_PER_PAGE: u32 = 100;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 15,
        }
    }
}

impl Pagination {
    /// Build from optional query values, clamping to sane bounds
    pub fn from_query(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(default_per_page)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    #[serde(flatten)]
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total: u64) -> Self {
        let meta = PaginationMeta::new(pagination, total, data.len());
        Self {
            data,
            pagination: meta,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
    /// 1-based position of the first row on this page, `None` when empty
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl PaginationMeta {
    pub fn new(pagination: Pagination, total: u64, page_len: usize) -> Self {
        let per_page = u64::from(pagination.per_page);
        let last_page = total.div_ceil(per_page).max(1);
        let first = u64::from(pagination.page - 1) * per_page + 1;

        let (from, to) = if page_len == 0 {
            (None, None)
        } else {
            (Some(first), Some(first + page_len as u64 - 1))
        };

        Self {
            current_page: pagination.page,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
            per_page: pagination.per_page,
            total,
            from,
            to,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Success envelope shared by every mutating endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Deserializer for patch fields that may be set, cleared or left alone.
///
/// Pair with `#[serde(default)]`: a missing key stays `None`, an explicit
/// `null` becomes `Some(None)` and a value becomes `Some(Some(v))`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_inputs() {
        let p = Pagination::from_query(Some(0), Some(1000), 15);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, MAX_PER_PAGE);

        let p = Pagination::from_query(None, None, 50);
        assert_eq!(p, Pagination { page: 1, per_page: 50 });
    }

    #[test]
    fn meta_for_partial_last_page() {
        let p = Pagination { page: 3, per_page: 15 };
        assert_eq!(p.offset(), 30);

        let meta = PaginationMeta::new(p, 37, 7);
        assert_eq!(meta.last_page, 3);
        assert_eq!(meta.from, Some(31));
        assert_eq!(meta.to, Some(37));
    }

    #[test]
    fn meta_for_empty_result() {
        let meta = PaginationMeta::new(Pagination::default(), 0, 0);
        assert_eq!(meta.last_page, 1);
        assert_eq!(meta.from, None);
        assert_eq!(meta.to, None);
    }

    #[test]
    fn paginated_response_flattens_meta() {
        let resp = PaginatedResponse::new(vec![1, 2], Pagination { page: 1, per_page: 2 }, 5);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["current_page"], 1);
        assert_eq!(json["last_page"], 3);
        assert_eq!(json["total"], 5);
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        note: Option<Option<String>>,
    }

    #[test]
    fn nullable_tells_missing_from_null() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.note, None);

        let cleared: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
        assert_eq!(cleared.note, Some(None));

        let set: Patch = serde_json::from_str(r#"{"note": "Gudang B"}"#).unwrap();
        assert_eq!(set.note, Some(Some("Gudang B".to_string())));
    }
}
