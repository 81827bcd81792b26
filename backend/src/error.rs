//! Error handling for Stokku
//!
//! Every failure leaves the API as `{success: false, code, message}` so no
//! error is thrown past the HTTP boundary.

use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{LedgerError, LifecycleError};
use thiserror::Error;

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Quantity must be a positive integer")]
    InvalidQuantity,

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    // Stock ledger errors
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("Item not found")]
    ItemNotFound,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Item is already in the trash")]
    AlreadyDeleted,

    #[error("Item is not in the trash")]
    NotTrashed,

    #[error("{resource} is referenced by {count} items")]
    ReferencedByItems { resource: String, count: i64 },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("{0}")]
    Conflict(String),

    // Storage errors
    #[error("Transaction failed: {0}")]
    TransactionFailed(sqlx::Error),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap a storage error raised inside a write transaction
    pub fn transaction(err: sqlx::Error) -> Self {
        match Self::from(err) {
            AppError::DatabaseError(e) => AppError::TransactionFailed(e),
            other => other,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InvalidQuantity => "INVALID_QUANTITY",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::ItemNotFound => "ITEM_NOT_FOUND",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyDeleted => "ALREADY_DELETED",
            AppError::NotTrashed => "NOT_TRASHED",
            AppError::ReferencedByItems { .. } => "REFERENCED_BY_ITEMS",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::Conflict(_) => "CONFLICT",
            AppError::TransactionFailed(_) => "TRANSACTION_FAILED",
            AppError::StorageError(_) => "STORAGE_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::InvalidQuantity => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_)
            | AppError::AlreadyDeleted
            | AppError::NotTrashed
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InsufficientStock { .. }
            | AppError::ReferencedByItems { .. }
            | AppError::InvalidStateTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ItemNotFound | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TransactionFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::StorageError(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller may safely retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransactionFailed(_))
    }

    fn public_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => "Invalid email or password".to_string(),
            AppError::InsufficientPermissions => {
                "You do not have permission to perform this action".to_string()
            }
            AppError::DuplicateEntry(field) => {
                format!("A record with this {} already exists", field)
            }
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::ReferencedByItems { resource, count } => format!(
                "{} cannot be deleted because it is used by {} items",
                resource, count
            ),
            AppError::TransactionFailed(_) => {
                "The change could not be saved and nothing was applied. Please retry.".to_string()
            }
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalError(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let field = match db_err.constraint() {
                    Some(c) if c.contains("sku") => "SKU",
                    Some(c) if c.contains("email") => "email",
                    Some(c) if c.contains("name") => "name",
                    _ => "value",
                };
                return AppError::DuplicateEntry(field.to_string());
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidQuantity | LedgerError::Overflow => AppError::InvalidQuantity,
            LedgerError::InsufficientStock {
                requested,
                available,
            } => AppError::InsufficientStock {
                requested,
                available,
            },
            LedgerError::UnknownMovementType(value) => {
                AppError::validation("type", format!("Unknown movement type: {}", value))
            }
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::AlreadyDeleted => AppError::AlreadyDeleted,
            LifecycleError::NotTrashed => AppError::NotTrashed,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors
            .field_errors()
            .into_iter()
            .min_by_key(|(field, _)| *field)
            .and_then(|(field, errs)| errs.first().map(|e| (field, e.clone())));

        match first {
            Some((field, err)) => {
                let message = err
                    .message
                    .map(|m| m.into_owned())
                    .unwrap_or_else(|| format!("{} is invalid ({})", field, err.code));
                AppError::validation(field, message)
            }
            None => AppError::validation("input", "Invalid input"),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::validation("file", format!("Invalid upload: {}", err.body_text()))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation("path", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation("query", rejection.body_text())
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.to_string(),
            message: message.into(),
            field: None,
            count: None,
            retryable: false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = ErrorResponse::new(self.code(), self.public_message());
        body.retryable = self.is_retryable();

        match &self {
            AppError::Validation { field, .. } => body.field = Some(field.clone()),
            AppError::DuplicateEntry(field) => body.field = Some(field.clone()),
            AppError::ReferencedByItems { count, .. } => body.count = Some(*count),
            _ => {}
        }

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_to_api_errors() {
        let err: AppError = LedgerError::InsufficientStock {
            requested: 40,
            available: 30,
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");

        let err: AppError = LedgerError::InvalidQuantity.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn lifecycle_errors_are_conflicts() {
        let err: AppError = LifecycleError::NotTrashed.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "NOT_TRASHED");
    }

    #[test]
    fn only_transaction_failures_are_retryable() {
        assert!(AppError::TransactionFailed(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!AppError::DatabaseError(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!AppError::ItemNotFound.is_retryable());
    }

    #[test]
    fn transaction_wrapper_marks_storage_errors() {
        let err = AppError::transaction(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::TransactionFailed(_)));
    }

    #[test]
    fn referenced_message_includes_count() {
        let err = AppError::ReferencedByItems {
            resource: "Category".to_string(),
            count: 3,
        };
        assert_eq!(
            err.public_message(),
            "Category cannot be deleted because it is used by 3 items"
        );
    }
}
