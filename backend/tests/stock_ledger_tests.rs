//! Stock ledger tests
//!
//! Pure properties of the movement arithmetic run everywhere. The database
//! tests cover atomicity, row-level serialization and the append-only table;
//! run them with `cargo test -- --ignored` and `DATABASE_URL` set.

mod common;

use chrono::Utc;
use proptest::prelude::*;
use shared::{plan_movement, verify_chain, LedgerError, MovementType, StockMovement};
use stokku_backend::error::AppError;
use stokku_backend::services::StockService;
use uuid::Uuid;

use common::TestDb;

/// Apply a sequence of requests the way the service does, keeping the ledger
fn replay(initial: i64, requests: &[(MovementType, i64)]) -> (i64, Vec<StockMovement>) {
    let item_id = Uuid::new_v4();
    let mut on_hand = initial;
    let mut ledger = Vec::new();

    if initial > 0 {
        let change = plan_movement(0, MovementType::In, initial).unwrap();
        ledger.push(entry(item_id, change));
    }

    for &(movement_type, quantity) in requests {
        if let Ok(change) = plan_movement(on_hand, movement_type, quantity) {
            on_hand = change.after;
            ledger.push(entry(item_id, change));
        }
    }
    (on_hand, ledger)
}

fn entry(item_id: Uuid, change: shared::StockChange) -> StockMovement {
    StockMovement {
        id: Uuid::new_v4(),
        item_id,
        item_name: "Test item".into(),
        item_sku: "TEST-001".into(),
        user_id: Uuid::nil(),
        movement_type: change.movement_type,
        quantity: change.quantity,
        stock_before: change.before,
        stock_after: change.after,
        note: None,
        reference_number: None,
        created_at: Utc::now(),
    }
}

fn movement_strategy() -> impl Strategy<Value = (MovementType, i64)> {
    (
        prop_oneof![Just(MovementType::In), Just(MovementType::Out)],
        -5i64..200,
    )
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// On-hand quantity never goes below zero, whatever is requested
    #[test]
    fn prop_stock_never_negative(
        initial in 0i64..500,
        requests in prop::collection::vec(movement_strategy(), 0..40),
    ) {
        let mut on_hand = initial;
        for (movement_type, quantity) in requests {
            match plan_movement(on_hand, movement_type, quantity) {
                Ok(change) => {
                    prop_assert!(change.after >= 0);
                    on_hand = change.after;
                }
                Err(_) => {
                    // rejected requests leave state untouched
                }
            }
            prop_assert!(on_hand >= 0);
        }
    }

    /// The latest entry's `after` always equals the current on-hand value
    #[test]
    fn prop_ledger_chain_ends_at_on_hand(
        initial in 0i64..500,
        requests in prop::collection::vec(movement_strategy(), 0..40),
    ) {
        let (on_hand, ledger) = replay(initial, &requests);
        prop_assert!(verify_chain(&ledger, on_hand));
        if let Some(last) = ledger.last() {
            prop_assert_eq!(last.stock_after, on_hand);
        }
    }

    /// In then out of the same quantity returns to the starting value
    #[test]
    fn prop_in_then_out_round_trips(initial in 0i64..10_000, quantity in 1i64..10_000) {
        let stock_in = plan_movement(initial, MovementType::In, quantity).unwrap();
        let stock_out = plan_movement(stock_in.after, MovementType::Out, quantity).unwrap();
        prop_assert_eq!(stock_out.after, initial);
        prop_assert_eq!(stock_in.after, stock_out.before);
    }

    /// Out requests above on-hand are rejected whole
    #[test]
    fn prop_no_partial_fulfilment(on_hand in 0i64..1000, excess in 1i64..1000) {
        let requested = on_hand + excess;
        prop_assert_eq!(
            plan_movement(on_hand, MovementType::Out, requested),
            Err(LedgerError::InsufficientStock { requested, available: on_hand })
        );
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn semen_portland_scenario() {
    let (on_hand, ledger) = replay(150, &[(MovementType::Out, 120), (MovementType::Out, 40)]);

    assert_eq!(on_hand, 30);
    assert!(shared::is_low_stock(on_hand, 50));
    // opening balance plus the accepted out; the 40 was rejected
    assert_eq!(ledger.len(), 2);
    let out = &ledger[1];
    assert_eq!(out.movement_type, MovementType::Out);
    assert_eq!((out.quantity, out.stock_before, out.stock_after), (120, 150, 30));
}

#[test]
fn broken_chain_is_detected() {
    let (on_hand, mut ledger) = replay(10, &[(MovementType::In, 5)]);
    assert!(verify_chain(&ledger, on_hand));
    ledger[1].stock_before = 9;
    assert!(!verify_chain(&ledger, on_hand));
}

// ============================================================================
// Database Tests
// ============================================================================

fn stock_service(ctx: &TestDb) -> StockService {
    StockService::new(ctx.db.clone(), ctx.storage.clone(), ctx.offset())
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn semen_portland_against_database() {
    let ctx = TestDb::new().await;
    let item = ctx.create_item("Semen Portland", 150, 50).await;
    assert!(!item.is_low_stock);

    let stock = stock_service(&ctx);
    let after = stock
        .stock_out(item.item.id, ctx.staff, 120, Some("Proyek gedung A".into()), None)
        .await
        .unwrap();
    assert_eq!(after.item.stock, 30);
    assert!(after.is_low_stock);

    let err = stock
        .stock_out(item.item.id, ctx.staff, 40, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientStock {
            requested: 40,
            available: 30
        }
    ));
    assert_eq!(ctx.stock_of(item.item.id).await, 30);

    let history = stock.item_history(item.item.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].note.as_deref(), Some("Opening balance"));
    let out = &history[1];
    assert_eq!(out.movement_type, MovementType::Out);
    assert_eq!((out.quantity, out.stock_before, out.stock_after), (120, 150, 30));
    assert_eq!(out.user_id, ctx.staff);
    assert!(verify_chain(&history, 30));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn in_then_out_writes_two_linked_entries() {
    let ctx = TestDb::new().await;
    let item = ctx.create_item("Cat Tembok", 0, 5).await;
    let stock = stock_service(&ctx);

    stock
        .stock_in(item.item.id, ctx.staff, 50, None, Some("PO-001".into()))
        .await
        .unwrap();
    let back = stock
        .stock_out(item.item.id, ctx.staff, 50, None, None)
        .await
        .unwrap();
    assert_eq!(back.item.stock, 0);

    let history = stock.item_history(item.item.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].reference_number.as_deref(), Some("PO-001"));
    assert_eq!(history[0].stock_after, history[1].stock_before);
    assert!(verify_chain(&history, 0));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn failed_ledger_insert_rolls_back_the_stock_update() {
    let ctx = TestDb::new().await;
    let item = ctx.create_item("Paku 5cm", 20, 5).await;
    let stock = stock_service(&ctx);

    // Too long for the column: the update succeeds, the ledger insert fails
    let err = stock
        .stock_in(item.item.id, ctx.staff, 5, None, Some("R".repeat(150)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TransactionFailed(_)));
    assert!(err.is_retryable());

    assert_eq!(ctx.stock_of(item.item.id).await, 20);
    let history = stock.item_history(item.item.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(verify_chain(&history, 20));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn concurrent_outs_cannot_overdraw() {
    let ctx = TestDb::new().await;
    let item = ctx.create_item("Besi Beton", 10, 2).await;
    let stock = stock_service(&ctx);

    let (a, b) = tokio::join!(
        stock.stock_out(item.item.id, ctx.staff, 6, None, None),
        stock.stock_out(item.item.id, ctx.admin, 6, None, None),
    );

    let results = [a, b];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::InsufficientStock { .. })))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(insufficient, 1);

    assert_eq!(ctx.stock_of(item.item.id).await, 4);
    let history = stock.item_history(item.item.id).await.unwrap();
    assert!(verify_chain(&history, 4));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn many_concurrent_movements_keep_the_chain() {
    let ctx = TestDb::new().await;
    let item = ctx.create_item("Pasir", 100, 10).await;
    let stock = stock_service(&ctx);

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let stock = stock.clone();
            let id = item.item.id;
            let actor = ctx.staff;
            tokio::spawn(async move {
                if i % 2 == 0 {
                    stock.stock_in(id, actor, 3, None, None).await
                } else {
                    stock.stock_out(id, actor, 7, None, None).await
                }
            })
        })
        .collect();
    for task in tasks {
        let _ = task.await.unwrap();
    }

    let on_hand = ctx.stock_of(item.item.id).await;
    let history = stock.item_history(item.item.id).await.unwrap();
    assert!(on_hand >= 0);
    assert!(verify_chain(&history, on_hand));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn trashed_items_reject_stock_movements() {
    let ctx = TestDb::new().await;
    let item = ctx.create_item("Keramik", 30, 5).await;
    ctx.items().soft_delete(item.item.id).await.unwrap();

    let err = stock_service(&ctx)
        .stock_in(item.item.id, ctx.staff, 1, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ItemNotFound));
    assert_eq!(ctx.stock_of(item.item.id).await, 30);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn unknown_item_is_not_found() {
    let ctx = TestDb::new().await;
    let err = stock_service(&ctx)
        .stock_in(Uuid::new_v4(), ctx.staff, 1, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ItemNotFound));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn ledger_rows_cannot_be_changed_or_removed() {
    let ctx = TestDb::new().await;
    let item = ctx.create_item("Triplek", 12, 2).await;

    let update = sqlx::query("UPDATE stock_movements SET quantity = 1 WHERE item_id = $1")
        .bind(item.item.id)
        .execute(&ctx.db)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM stock_movements WHERE item_id = $1")
        .bind(item.item.id)
        .execute(&ctx.db)
        .await;
    assert!(delete.is_err());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn ledger_survives_force_delete() {
    let ctx = TestDb::new().await;
    let item = ctx.create_item("Lem Kayu", 8, 1).await;
    let items = ctx.items();
    items.soft_delete(item.item.id).await.unwrap();
    items.force_delete(item.item.id).await.unwrap();

    let history = stock_service(&ctx).item_history(item.item.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].item_name, "Lem Kayu");
    assert_eq!(history[0].item_sku, item.item.sku);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (set DATABASE_URL)"]
async fn movement_listing_filters_by_item_and_type() {
    use stokku_backend::services::stock::MovementQuery;

    let ctx = TestDb::new().await;
    let item = ctx.create_item("Genteng", 40, 10).await;
    let stock = stock_service(&ctx);
    stock.stock_out(item.item.id, ctx.staff, 5, None, None).await.unwrap();
    stock.stock_out(item.item.id, ctx.staff, 5, None, None).await.unwrap();

    let outs = stock
        .list(&MovementQuery {
            item_id: Some(item.item.id),
            movement_type: Some(MovementType::Out),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(outs.pagination.total, 2);
    assert!(outs
        .data
        .iter()
        .all(|e| e.movement.movement_type == MovementType::Out));
    // newest first
    assert_eq!(outs.data[0].movement.stock_after, 30);
    assert!(outs.data[0].user_name.is_some());
}
