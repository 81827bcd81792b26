//! User accounts: admin management and the caller's own profile

use bcrypt::{hash, verify, DEFAULT_COST};
use serde::{Deserialize, Serialize};
use shared::{nullable, PaginatedResponse, Pagination, Role, SortOrder, User};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::{FileStorage, StorageDir};
use crate::services::auth::USER_COLUMNS;
use crate::services::item::search_pattern;

const DEFAULT_PER_PAGE: u32 = 15;

// $1 search pattern, $2 role, $3 active flag
const USER_FILTERS: &str = r#"
    ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1 OR position ILIKE $1 OR department ILIKE $1)
    AND ($2::user_role IS NULL OR role = $2)
    AND ($3::bool IS NULL OR is_active = $3)
"#;

/// User as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    pub fn new(user: User, storage: &FileStorage) -> Self {
        let avatar_url = user
            .avatar
            .as_deref()
            .map(|name| storage.public_url(StorageDir::Avatars, name));
        Self { user, avatar_url }
    }
}

/// User listing filters
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Input for creating a user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub position: Option<String>,
    #[validate(length(max = 255))]
    pub department: Option<String>,
    pub role: Role,
    pub is_active: Option<bool>,
}

/// Input for updating a user. A blank password keeps the current one.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub position: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub department: Option<Option<String>>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// Profile edit by the account owner. Replaces every descriptive field.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub position: Option<String>,
    #[validate(length(max = 255))]
    pub department: Option<String>,
    pub current_password: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

/// User service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
    storage: FileStorage,
}

impl UserService {
    pub fn new(db: PgPool, storage: FileStorage) -> Self {
        Self { db, storage }
    }

    pub async fn list(&self, query: &UserQuery) -> AppResult<PaginatedResponse<UserProfile>> {
        let sort = match query.sort_by.as_deref() {
            None | Some("name") => "name",
            Some("email") => "email",
            Some("role") => "role",
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

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM users WHERE {}",
            USER_FILTERS
        ))
        .bind(&search)
        .bind(query.role)
        .bind(query.active)
        .fetch_one(&self.db)
        .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE {} ORDER BY {} {}, id ASC LIMIT $4 OFFSET $5",
            USER_COLUMNS,
            USER_FILTERS,
            sort,
            order.as_sql()
        ))
        .bind(&search)
        .bind(query.role)
        .bind(query.active)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(users, pagination, total.max(0) as u64)
            .map(|user| UserProfile::new(user, &self.storage)))
    }

    pub async fn get(&self, user_id: Uuid) -> AppResult<UserProfile> {
        let user = self.find(user_id).await?;
        Ok(UserProfile::new(user, &self.storage))
    }

    pub async fn create(&self, input: CreateUserInput) -> AppResult<UserProfile> {
        input.validate()?;
        let password_hash = hash_password(&input.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, phone, position, department, role, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(normalize_email(&input.email))
        .bind(&password_hash)
        .bind(&input.phone)
        .bind(&input.position)
        .bind(&input.department)
        .bind(input.role)
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "user created");
        Ok(UserProfile::new(user, &self.storage))
    }

    /// Admin edit of any account. Admins cannot demote or deactivate themselves.
    pub async fn update(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> AppResult<UserProfile> {
        input.validate()?;
        if let Some(Some(phone)) = &input.phone {
            if phone.chars().count() > 20 {
                return Err(AppError::validation(
                    "phone",
                    "Phone must be at most 20 characters",
                ));
            }
        }
        if actor_id == user_id {
            if input.role.is_some_and(|role| role != Role::Admin) {
                return Err(AppError::Conflict(
                    "You cannot change your own role".into(),
                ));
            }
            if input.is_active == Some(false) {
                return Err(AppError::Conflict(
                    "You cannot deactivate your own account".into(),
                ));
            }
        }

        let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => {
                shared::validate_password(password)
                    .map_err(|m| AppError::validation("password", m))?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                is_active = COALESCE($6, is_active),
                phone = CASE WHEN $7::bool THEN $8::varchar ELSE phone END,
                position = CASE WHEN $9::bool THEN $10::varchar ELSE position END,
                department = CASE WHEN $11::bool THEN $12::varchar ELSE department END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.email.as_deref().map(normalize_email))
        .bind(password_hash)
        .bind(input.role)
        .bind(input.is_active)
        .bind(input.phone.is_some())
        .bind(input.phone.as_ref().and_then(|p| p.as_deref()))
        .bind(input.position.is_some())
        .bind(input.position.as_ref().and_then(|p| p.as_deref()))
        .bind(input.department.is_some())
        .bind(input.department.as_ref().and_then(|d| d.as_deref()))
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".into()))?;

        tracing::info!(user_id = %user.id, actor_id = %actor_id, "user updated");
        Ok(UserProfile::new(user, &self.storage))
    }

    /// Delete an account. Accounts that appear in the stock ledger are kept;
    /// deactivate them instead.
    pub async fn delete(&self, actor_id: Uuid, user_id: Uuid) -> AppResult<()> {
        if actor_id == user_id {
            return Err(AppError::Conflict(
                "You cannot delete your own account".into(),
            ));
        }

        let mut tx = self.db.begin().await.map_err(AppError::transaction)?;

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::transaction)?
        .ok_or_else(|| AppError::NotFound("User".into()))?;

        let movements = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stock_movements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::transaction)?;
        if movements > 0 {
            return Err(AppError::Conflict(format!(
                "User has recorded {} stock movements; deactivate the account instead",
                movements
            )));
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::transaction)?;
        tx.commit().await.map_err(AppError::transaction)?;

        if let Some(avatar) = user.avatar.as_deref() {
            self.discard_avatar(user_id, avatar).await;
        }

        tracing::info!(user_id = %user_id, actor_id = %actor_id, "user deleted");
        Ok(())
    }

    /// Flip an account between active and inactive
    pub async fn toggle_status(&self, actor_id: Uuid, user_id: Uuid) -> AppResult<UserProfile> {
        if actor_id == user_id {
            return Err(AppError::Conflict(
                "You cannot deactivate your own account".into(),
            ));
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = NOT is_active, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".into()))?;

        tracing::info!(user_id = %user.id, is_active = user.is_active, "user status toggled");
        Ok(UserProfile::new(user, &self.storage))
    }

    /// Owner edit of their own profile
    pub async fn update_profile(&self, user_id: Uuid, input: ProfileInput) -> AppResult<UserProfile> {
        input.validate()?;

        let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => {
                shared::validate_password(password)
                    .map_err(|m| AppError::validation("password", m))?;
                if input.password_confirmation.as_deref() != Some(password) {
                    return Err(AppError::validation(
                        "password",
                        "Password confirmation does not match",
                    ));
                }
                let current = input
                    .current_password
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        AppError::validation(
                            "current_password",
                            "Current password is required to change password",
                        )
                    })?;
                self.verify_password(user_id, current).await?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = $2,
                email = $3,
                phone = $4,
                position = $5,
                department = $6,
                password_hash = COALESCE($7, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(input.name.trim())
        .bind(normalize_email(&input.email))
        .bind(&input.phone)
        .bind(&input.position)
        .bind(&input.department)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".into()))?;

        tracing::info!(user_id = %user.id, "profile updated");
        Ok(UserProfile::new(user, &self.storage))
    }

    /// Replace the caller's avatar, removing the previous file
    pub async fn replace_avatar(
        &self,
        user_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> AppResult<UserProfile> {
        let extension = shared::validate_upload_extension(filename, shared::AVATAR_EXTENSIONS)
            .map_err(|m| AppError::validation("avatar", m))?;
        if bytes.len() > shared::AVATAR_MAX_BYTES {
            return Err(AppError::validation("avatar", "Avatar must be at most 2 MB"));
        }

        let current = self.find(user_id).await?;
        let stored = self
            .storage
            .save(StorageDir::Avatars, &format!("{}_", user_id.simple()), &extension, bytes)
            .await?;

        let updated = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(&stored)
        .fetch_optional(&self.db)
        .await;

        let user = match updated {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.discard_avatar(user_id, &stored).await;
                return Err(AppError::NotFound("User".into()));
            }
            Err(e) => {
                self.discard_avatar(user_id, &stored).await;
                return Err(e.into());
            }
        };

        if let Some(old) = current.avatar.as_deref() {
            self.discard_avatar(user_id, old).await;
        }

        tracing::info!(user_id = %user.id, avatar = %stored, "avatar replaced");
        Ok(UserProfile::new(user, &self.storage))
    }

    async fn find(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))
    }

    async fn verify_password(&self, user_id: Uuid, password: &str) -> AppResult<()> {
        let password_hash =
            sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("User".into()))?;

        let valid = verify(password, &password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if valid {
            Ok(())
        } else {
            Err(AppError::validation(
                "current_password",
                "Current password is incorrect",
            ))
        }
    }

    async fn discard_avatar(&self, user_id: Uuid, avatar: &str) {
        if let Err(e) = self.storage.delete_if_exists(StorageDir::Avatars, avatar).await {
            tracing::warn!(user_id = %user_id, avatar = %avatar, error = %e, "avatar file was not removed");
        }
    }
}

fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emails_are_stored_lowercase() {
        assert_eq!(normalize_email("  Budi@Stokku.Local "), "budi@stokku.local");
    }

    #[test]
    fn create_input_rejects_short_passwords_and_bad_emails() {
        let input: CreateUserInput = serde_json::from_value(json!({
            "name": "Budi",
            "email": "budi@stokku.local",
            "password": "short",
            "role": "staff",
        }))
        .unwrap();
        assert!(input.validate().is_err());

        let input: CreateUserInput = serde_json::from_value(json!({
            "name": "Budi",
            "email": "not-an-email",
            "password": "long-enough",
            "role": "manager",
        }))
        .unwrap();
        let err: AppError = input.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "email"));
    }

    #[test]
    fn unknown_roles_do_not_deserialize() {
        let result = serde_json::from_value::<CreateUserInput>(json!({
            "name": "Budi",
            "email": "budi@stokku.local",
            "password": "long-enough",
            "role": "owner",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn update_input_tells_cleared_from_missing() {
        let input: UpdateUserInput =
            serde_json::from_value(json!({ "phone": null, "role": "manager" })).unwrap();
        assert_eq!(input.phone, Some(None));
        assert_eq!(input.position, None);
        assert_eq!(input.role, Some(Role::Manager));
    }
}
