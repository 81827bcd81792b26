//! User management and profile tests
//!
//! Run with `cargo test -- --ignored` and `DATABASE_URL` set.

mod common;

use shared::{MovementType, Role};
use stokku_backend::error::AppError;
use stokku_backend::services::stock::MovementRequest;
use stokku_backend::services::user::{CreateUserInput, ProfileInput, UpdateUserInput, UserQuery};
use stokku_backend::services::{AuthService, StockService, UserService};
use uuid::Uuid;

use common::TestDb;

fn users(ctx: &TestDb) -> UserService {
    UserService::new(ctx.db.clone(), ctx.storage.clone())
}

fn new_user(email: &str, role: Role) -> CreateUserInput {
    CreateUserInput {
        name: "Siti Rahma".into(),
        email: email.into(),
        password: "rahasia-123".into(),
        phone: Some("0812345678".into()),
        position: Some("Gudang".into()),
        department: None,
        role,
        is_active: None,
    }
}

fn unique_email() -> String {
    format!("Siti.{}@Stokku.Local", Uuid::new_v4().simple())
}

fn profile_input(name: &str, email: &str) -> ProfileInput {
    ProfileInput {
        name: name.into(),
        email: email.into(),
        phone: None,
        position: None,
        department: None,
        current_password: None,
        password: None,
        password_confirmation: None,
    }
}

// ============================================================================
// Account Management
// ============================================================================

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn created_users_can_log_in_with_their_role() {
    let ctx = TestDb::new().await;
    let email = unique_email();

    let created = users(&ctx)
        .create(new_user(&email, Role::Manager))
        .await
        .unwrap();
    assert_eq!(created.user.email, email.to_lowercase());
    assert_eq!(created.user.role, Role::Manager);
    assert!(created.user.is_active);

    let login = AuthService::new(ctx.db.clone(), &ctx.config)
        .login(&email, "rahasia-123")
        .await
        .unwrap();
    assert_eq!(login.user.id, created.user.id);
    assert_eq!(login.user.role, Role::Manager);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn emails_are_unique_regardless_of_case() {
    let ctx = TestDb::new().await;
    let service = users(&ctx);
    let email = unique_email();
    service.create(new_user(&email, Role::Staff)).await.unwrap();

    let err = service
        .create(new_user(&email.to_uppercase(), Role::Staff))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateEntry(ref field) if field == "email"));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn listing_filters_by_role_and_search() {
    let ctx = TestDb::new().await;
    let service = users(&ctx);
    let marker = Uuid::new_v4().simple().to_string();
    for role in [Role::Staff, Role::Staff, Role::Manager] {
        let mut input = new_user(&unique_email(), role);
        input.name = format!("Petugas {}", marker);
        service.create(input).await.unwrap();
    }

    let staff = service
        .list(&UserQuery {
            search: Some(marker.clone()),
            role: Some(Role::Staff),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(staff.pagination.total, 2);
    assert!(staff.data.iter().all(|u| u.user.role == Role::Staff));

    let everyone = service
        .list(&UserQuery {
            search: Some(marker),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(everyone.pagination.total, 3);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn update_changes_role_and_can_clear_contact_fields() {
    let ctx = TestDb::new().await;
    let service = users(&ctx);
    let user = service
        .create(new_user(&unique_email(), Role::Staff))
        .await
        .unwrap();

    let patch: UpdateUserInput =
        serde_json::from_value(serde_json::json!({ "role": "manager", "phone": null })).unwrap();
    let updated = service
        .update(ctx.admin, user.user.id, patch)
        .await
        .unwrap();
    assert_eq!(updated.user.role, Role::Manager);
    assert_eq!(updated.user.phone, None);
    assert_eq!(updated.user.position.as_deref(), Some("Gudang"));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn admins_cannot_lock_themselves_out() {
    let ctx = TestDb::new().await;
    let service = users(&ctx);

    assert!(matches!(
        service.toggle_status(ctx.admin, ctx.admin).await.unwrap_err(),
        AppError::Conflict(_)
    ));
    assert!(matches!(
        service.delete(ctx.admin, ctx.admin).await.unwrap_err(),
        AppError::Conflict(_)
    ));
    let demote = UpdateUserInput {
        role: Some(Role::Staff),
        ..Default::default()
    };
    assert!(matches!(
        service.update(ctx.admin, ctx.admin, demote).await.unwrap_err(),
        AppError::Conflict(_)
    ));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn deactivated_users_cannot_log_in() {
    let ctx = TestDb::new().await;
    let service = users(&ctx);
    let email = unique_email();
    let user = service.create(new_user(&email, Role::Staff)).await.unwrap();

    let toggled = service.toggle_status(ctx.admin, user.user.id).await.unwrap();
    assert!(!toggled.user.is_active);

    let auth = AuthService::new(ctx.db.clone(), &ctx.config);
    assert!(matches!(
        auth.login(&email, "rahasia-123").await.unwrap_err(),
        AppError::Unauthorized(_)
    ));

    let toggled = service.toggle_status(ctx.admin, user.user.id).await.unwrap();
    assert!(toggled.user.is_active);
    auth.login(&email, "rahasia-123").await.unwrap();
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn users_in_the_ledger_are_kept() {
    let ctx = TestDb::new().await;
    let service = users(&ctx);
    let clerk = service
        .create(new_user(&unique_email(), Role::Staff))
        .await
        .unwrap();
    let item = ctx.create_item("Besi Beton", 10, 0).await;

    StockService::new(ctx.db.clone(), ctx.storage.clone(), ctx.offset())
        .apply_movement(
            item.item.id,
            clerk.user.id,
            MovementRequest {
                movement_type: MovementType::Out,
                quantity: 2,
                note: None,
                reference_number: None,
            },
        )
        .await
        .unwrap();

    let err = service.delete(ctx.admin, clerk.user.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(service.get(clerk.user.id).await.is_ok());

    let idle = service
        .create(new_user(&unique_email(), Role::Staff))
        .await
        .unwrap();
    service.delete(ctx.admin, idle.user.id).await.unwrap();
    assert!(matches!(
        service.get(idle.user.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
}

// ============================================================================
// Profile
// ============================================================================

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn password_change_needs_the_current_password() {
    let ctx = TestDb::new().await;
    let service = users(&ctx);
    let email = unique_email();
    let user = service.create(new_user(&email, Role::Staff)).await.unwrap();

    let mut input = profile_input("Siti R.", &email);
    input.password = Some("baru-sekali-1".into());
    input.password_confirmation = Some("baru-sekali-1".into());
    let err = service
        .update_profile(user.user.id, input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "current_password"));

    let mut input = profile_input("Siti R.", &email);
    input.current_password = Some("salah-total".into());
    input.password = Some("baru-sekali-1".into());
    input.password_confirmation = Some("baru-sekali-1".into());
    let err = service
        .update_profile(user.user.id, input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "current_password"));

    let mut input = profile_input("Siti R.", &email);
    input.current_password = Some("rahasia-123".into());
    input.password = Some("baru-sekali-1".into());
    input.password_confirmation = Some("baru-sekali-1".into());
    let updated = service.update_profile(user.user.id, input).await.unwrap();
    assert_eq!(updated.user.name, "Siti R.");
    // the profile form replaces contact fields wholesale
    assert_eq!(updated.user.position, None);

    let auth = AuthService::new(ctx.db.clone(), &ctx.config);
    auth.login(&email, "baru-sekali-1").await.unwrap();
    assert!(matches!(
        auth.login(&email, "rahasia-123").await.unwrap_err(),
        AppError::InvalidCredentials
    ));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn profile_email_cannot_take_another_account() {
    let ctx = TestDb::new().await;
    let service = users(&ctx);
    let taken = unique_email();
    service.create(new_user(&taken, Role::Staff)).await.unwrap();
    let me = service
        .create(new_user(&unique_email(), Role::Staff))
        .await
        .unwrap();

    let err = service
        .update_profile(me.user.id, profile_input("Siti", &taken))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateEntry(ref field) if field == "email"));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn avatar_upload_replaces_the_previous_file() {
    let ctx = TestDb::new().await;
    let service = users(&ctx);
    let png = [0x89, b'P', b'N', b'G'];

    let first = service
        .replace_avatar(ctx.staff, "saya.png", &png)
        .await
        .unwrap();
    let first_name = first.user.avatar.clone().unwrap();
    let dir = ctx.storage.root().join("avatars");
    assert!(dir.join(&first_name).exists());
    assert!(first.avatar_url.unwrap().ends_with(&first_name));

    let second = service
        .replace_avatar(ctx.staff, "saya.jpg", &png)
        .await
        .unwrap();
    let second_name = second.user.avatar.unwrap();
    assert!(dir.join(&second_name).exists());
    assert!(!dir.join(&first_name).exists());

    let err = service
        .replace_avatar(ctx.staff, "saya.svg", &png)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "avatar"));
}
