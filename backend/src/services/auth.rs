//! Authentication service for login, token management and the first admin

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{Role, User};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

pub(crate) const USER_COLUMNS: &str = "id, name, email, phone, position, department, avatar, \
     role, is_active, created_at, updated_at";

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Result of a successful login
#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, sqlx::FromRow)]
struct Credentials {
    id: Uuid,
    password_hash: String,
    role: Role,
    is_active: bool,
}

impl AuthService {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
        }
    }

    /// Authenticate user with email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResult> {
        let credentials = sqlx::query_as::<_, Credentials>(
            "SELECT id, password_hash, role, is_active FROM users WHERE email = $1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        let valid = verify(password, &credentials.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            tracing::warn!(%email, "failed login attempt");
            return Err(AppError::InvalidCredentials);
        }

        if !credentials.is_active {
            return Err(AppError::Unauthorized("Account is disabled".into()));
        }

        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(credentials.id)
            .execute(&self.db)
            .await?;

        let access_token = self.generate_token(credentials.id, credentials.role)?;
        let user = self.me(credentials.id).await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "user logged in");

        Ok(LoginResult {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
            user,
        })
    }

    /// Profile of the authenticated user
    pub async fn me(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))
    }

    /// Create an admin account unless one with this email already exists.
    ///
    /// Returns whether a user was created.
    pub async fn ensure_admin(&self, email: &str, password: &str, name: &str) -> AppResult<bool> {
        shared::validate_email(email).map_err(|m| AppError::validation("email", m))?;
        shared::validate_password(password).map_err(|m| AppError::validation("password", m))?;

        let password_hash = hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let created = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(email.trim().to_lowercase())
        .bind(&password_hash)
        .bind(Role::Admin)
        .execute(&self.db)
        .await?
        .rows_affected()
            > 0;

        if created {
            tracing::info!(%email, "bootstrap admin created");
        }
        Ok(created)
    }

    /// Generate a signed access token
    pub fn generate_token(&self, user_id: Uuid, role: Role) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}

/// Decode and validate an access token
pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/stokku_unused")
            .unwrap();
        AuthService {
            db,
            jwt_secret: "test-secret".into(),
            access_token_expiry: 3600,
        }
    }

    #[tokio::test]
    async fn token_round_trip_keeps_role() {
        let service = service();
        let user_id = Uuid::new_v4();
        let token = service.generate_token(user_id, Role::Manager).unwrap();

        let claims = decode_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, Role::Manager);
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn token_with_wrong_secret_is_rejected() {
        let token = service().generate_token(Uuid::new_v4(), Role::Staff).unwrap();
        assert!(matches!(
            decode_token(&token, "other-secret"),
            Err(AppError::Unauthorized(_))
        ));
    }
}
