//! Authentication and authorization tests
//!
//! Property tests over the role/permission matrix plus token handling.
//! Login against a real user table runs with `cargo test -- --ignored`.

mod common;

use proptest::prelude::*;
use shared::{Action, Role};
use stokku_backend::error::AppError;
use stokku_backend::middleware::AuthUser;
use stokku_backend::services::auth::decode_token;
use stokku_backend::services::AuthService;
use uuid::Uuid;

use common::{offline_state, TestDb, JWT_SECRET};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Admin), Just(Role::Manager), Just(Role::Staff)]
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::ViewInventory),
        Just(Action::RecordStock),
        Just(Action::ManageItems),
        Just(Action::ManageCatalogs),
        Just(Action::DestroyItems),
        Just(Action::ViewAllAttendance),
        Just(Action::ManageUsers),
    ]
}

fn rank(role: Role) -> u8 {
    match role {
        Role::Staff => 0,
        Role::Manager => 1,
        Role::Admin => 2,
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// A higher role can do everything a lower role can
    #[test]
    fn prop_permissions_are_monotonic(
        a in role_strategy(),
        b in role_strategy(),
        action in action_strategy(),
    ) {
        if rank(a) >= rank(b) && b.can(action) {
            prop_assert!(a.can(action));
        }
    }

    /// Every role may record stock movements and read inventory
    #[test]
    fn prop_everyone_records_stock(role in role_strategy()) {
        prop_assert!(role.can(Action::RecordStock));
        prop_assert!(role.can(Action::ViewInventory));
    }

    /// `require` agrees with the permission matrix
    #[test]
    fn prop_require_matches_can(role in role_strategy(), action in action_strategy()) {
        let user = AuthUser { user_id: Uuid::new_v4(), role };
        let result = user.require(action);
        prop_assert_eq!(result.is_ok(), role.can(action));
        if let Err(err) = result {
            prop_assert!(matches!(err, AppError::InsufficientPermissions));
        }
    }
}

// ============================================================================
// Token Tests
// ============================================================================

#[tokio::test]
async fn issued_tokens_decode_with_the_configured_secret() {
    let state = offline_state();
    let service = AuthService::new(state.db.clone(), &state.config);
    let user_id = Uuid::new_v4();

    let token = service.generate_token(user_id, Role::Staff).unwrap();
    let claims = decode_token(&token, JWT_SECRET).unwrap();
    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.role, Role::Staff);
    assert!(claims.exp > claims.iat);

    assert!(matches!(
        decode_token(&token, "another-secret"),
        Err(AppError::Unauthorized(_))
    ));
}

#[test]
fn garbage_is_not_a_token() {
    assert!(decode_token("not.a.jwt", JWT_SECRET).is_err());
    assert!(decode_token("", JWT_SECRET).is_err());
}

// ============================================================================
// Database Tests
// ============================================================================

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn bootstrap_admin_can_log_in_once_created() {
    let ctx = TestDb::new().await;
    let service = AuthService::new(ctx.db.clone(), &ctx.config);
    let email = format!("Admin-{}@Stokku.Local", Uuid::new_v4().simple());

    assert!(service
        .ensure_admin(&email, "s3cret-pass", "Administrator")
        .await
        .unwrap());
    assert!(!service
        .ensure_admin(&email.to_lowercase(), "other-pass", "Administrator")
        .await
        .unwrap());

    // Emails are matched case-insensitively
    let login = service.login(&email, "s3cret-pass").await.unwrap();
    assert_eq!(login.user.role, Role::Admin);
    assert_eq!(login.token_type, "Bearer");
    let claims = decode_token(&login.access_token, JWT_SECRET).unwrap();
    assert_eq!(claims.sub, login.user.id.to_string());

    assert!(matches!(
        service.login(&email, "wrong-pass").await.unwrap_err(),
        AppError::InvalidCredentials
    ));
    assert!(matches!(
        service
            .login("nobody@stokku.local", "s3cret-pass")
            .await
            .unwrap_err(),
        AppError::InvalidCredentials
    ));
}
