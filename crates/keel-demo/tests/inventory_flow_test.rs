//! End-to-end tests of the demo engine over the in-memory stores.

use std::sync::Arc;

use keel_core::aggregate::AggregateRoot;
use keel_core::error::DomainError;
use keel_core::identity::Identifier;
use keel_core::listener::EventListener;
use keel_core::snapshot::{SnapshotStore, Snapshotter};
use keel_demo::app::Engine;
use keel_demo::config::DemoConfig;
use keel_demo::domain::{Inventory, RestockProcess, StockLevels};
use keel_demo::error::AppError;
use keel_test_support::{FixedClock, SequenceIdentifierFactory};

fn engine(snapshot_every: u64) -> Engine {
    let config = DemoConfig {
        snapshot_every,
        replay_batch: 2,
        ..DemoConfig::default()
    };
    Engine::new(
        &config,
        Arc::new(FixedClock::default()),
        Arc::new(SequenceIdentifierFactory::new()),
    )
}

/// Stocks two warehouses and empties the north gadgets: five events, the
/// last two from a single command.
async fn seed(engine: &Engine) -> (Identifier, Identifier) {
    let north = Identifier::new("warehouse-north");
    let south = Identifier::new("warehouse-south");
    engine
        .execute(&north, |inv, ctx| {
            inv.stock_item("widget", 10, ctx)?;
            inv.stock_item("gadget", 2, ctx)
        })
        .await
        .unwrap();
    engine
        .execute(&south, |inv, ctx| inv.stock_item("widget", 4, ctx))
        .await
        .unwrap();
    engine
        .execute(&north, |inv, ctx| inv.remove_item("gadget", 2, ctx))
        .await
        .unwrap();
    (north, south)
}

#[tokio::test]
async fn test_execute_commits_events_and_returns_applied_inventory() {
    // Arrange
    let engine = engine(0);
    let north = Identifier::new("warehouse-north");

    // Act
    let inventory = engine
        .execute(&north, |inv, ctx| inv.stock_item("widget", 3, ctx))
        .await
        .unwrap();

    // Assert
    assert_eq!(inventory.version(), 1);
    assert_eq!(inventory.quantity("widget"), 3);
    assert!(inventory.uncommitted_events().is_empty());
    assert_eq!(engine.events().head_position().unwrap(), 1);
}

#[tokio::test]
async fn test_rejected_command_appends_nothing() {
    // Arrange
    let engine = engine(0);
    let (north, _) = seed(&engine).await;
    let head = engine.events().head_position().unwrap();

    // Act
    let result = engine
        .execute(&north, |inv, ctx| inv.remove_item("widget", 11, ctx))
        .await;

    // Assert
    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::Validation(_)))
    ));
    assert_eq!(engine.events().head_position().unwrap(), head);
}

#[tokio::test]
async fn test_command_without_events_returns_unchanged_inventory() {
    let engine = engine(0);
    let (north, _) = seed(&engine).await;

    let inventory = engine.execute(&north, |_, _| Ok(())).await.unwrap();

    assert_eq!(inventory.version(), 4);
    assert_eq!(engine.events().head_position().unwrap(), 5);
}

#[tokio::test]
async fn test_snapshots_follow_policy_and_load_matches_full_replay() {
    // Arrange
    let engine = engine(2);

    // Act
    let (north, south) = seed(&engine).await;

    // Assert
    let snapshot = engine
        .snapshots()
        .load(Inventory::AGGREGATE_TYPE, &north)
        .await
        .unwrap()
        .expect("north should have been snapshotted");
    assert_eq!(snapshot.version, 4);
    assert!(
        engine
            .snapshots()
            .load(Inventory::AGGREGATE_TYPE, &south)
            .await
            .unwrap()
            .is_none()
    );

    let loaded = engine.load_inventory(&north).await.unwrap();
    let replayed = Snapshotter::disabled()
        .rehydrate(Inventory::new(north.clone()), engine.events())
        .await
        .unwrap();
    assert_eq!(loaded.version(), replayed.version());
    assert_eq!(loaded.stock(), replayed.stock());
    assert_eq!(loaded.quantity("widget"), 10);
    assert_eq!(loaded.quantity("gadget"), 0);
}

#[tokio::test]
async fn test_load_after_snapshot_replays_the_tail() {
    // Arrange
    let engine = engine(2);
    let (north, _) = seed(&engine).await;

    // Act
    engine
        .execute(&north, |inv, ctx| inv.stock_item("gadget", 5, ctx))
        .await
        .unwrap();
    let loaded = engine.load_inventory(&north).await.unwrap();

    // Assert
    assert_eq!(loaded.version(), 5);
    assert_eq!(loaded.quantity("gadget"), 5);
    let stored = engine
        .snapshots()
        .latest_version(Inventory::AGGREGATE_TYPE, &north)
        .await
        .unwrap();
    assert_eq!(stored, Some(4));
}

#[tokio::test]
async fn test_projections_see_every_warehouse() {
    // Arrange
    let engine = engine(0);
    let (north, south) = seed(&engine).await;

    // Act
    let levels = engine
        .project(StockLevels::new(engine.listener_id("stock-levels")))
        .await
        .unwrap();

    // Assert
    assert_eq!(levels.total("widget"), 14);
    assert_eq!(levels.total("gadget"), 0);
    assert_eq!(levels.level(&north, "widget"), 10);
    assert_eq!(levels.level(&south, "widget"), 4);
    assert_eq!(levels.subscription().position(), 5);
    assert!(!levels.subscription().is_dirty());
}

#[tokio::test]
async fn test_project_twice_does_not_double_count() {
    // Arrange
    let engine = engine(0);
    seed(&engine).await;
    let levels = engine
        .project(StockLevels::new(engine.listener_id("stock-levels")))
        .await
        .unwrap();

    // Act
    let levels = engine.project(levels).await.unwrap();

    // Assert
    assert_eq!(levels.total("widget"), 14);
    assert_eq!(levels.subscription().handled(), 4);
}

#[tokio::test]
async fn test_fresh_listener_resumes_from_saved_position() {
    // Arrange
    let engine = engine(0);
    let (north, _) = seed(&engine).await;
    let id = engine.listener_id("stock-levels");
    engine.project(StockLevels::new(id.clone())).await.unwrap();
    engine
        .execute(&north, |inv, ctx| inv.stock_item("widget", 1, ctx))
        .await
        .unwrap();

    // Act
    let fresh = engine.project(StockLevels::new(id.clone())).await.unwrap();

    // Assert
    assert_eq!(fresh.total("widget"), 1);
    let saved = engine.subscriptions().load(&id).await.unwrap();
    assert_eq!(saved.position(), 6);
}

#[tokio::test]
async fn test_restock_process_completes_after_restock() {
    // Arrange
    let engine = engine(2);
    let (north, _) = seed(&engine).await;
    let restock = engine
        .project(RestockProcess::new(engine.listener_id("restock")))
        .await
        .unwrap();
    let open: Vec<_> = restock.open_requests().cloned().collect();

    // Act
    engine
        .execute(&north, |inv, ctx| inv.stock_item("gadget", 5, ctx))
        .await
        .unwrap();
    let restock = engine.project(restock).await.unwrap();

    // Assert
    assert_eq!(open, vec![(north.clone(), "gadget".to_owned())]);
    assert!(restock.subscription().is_completed());
    assert_eq!(restock.fulfilled(), &[(north, "gadget".to_owned())]);
    let saved = engine
        .subscriptions()
        .load(restock.listener_id())
        .await
        .unwrap();
    assert!(saved.is_completed());
}

#[tokio::test]
async fn test_resumed_restock_process_is_not_completed_by_old_requests() {
    // Arrange
    let engine = engine(0);
    let (north, _) = seed(&engine).await;
    let id = engine.listener_id("restock");
    engine.project(RestockProcess::new(id.clone())).await.unwrap();

    // Act
    engine
        .execute(&north, |inv, ctx| inv.stock_item("gadget", 5, ctx))
        .await
        .unwrap();
    let resumed = engine.project(RestockProcess::new(id.clone())).await.unwrap();

    // Assert
    assert!(!resumed.subscription().is_completed());
    assert!(resumed.fulfilled().is_empty());
    assert_eq!(resumed.subscription().position(), 6);
    let saved = engine.subscriptions().load(&id).await.unwrap();
    assert!(!saved.is_completed());
}

#[tokio::test]
async fn test_overflowing_stock_is_rejected_and_stream_still_loads() {
    // Arrange
    let engine = engine(0);
    let north = Identifier::new("warehouse-north");
    engine
        .execute(&north, |inv, ctx| inv.stock_item("widget", u32::MAX, ctx))
        .await
        .unwrap();

    // Act
    let result = engine
        .execute(&north, |inv, ctx| inv.stock_item("widget", 1, ctx))
        .await;
    let loaded = engine.load_inventory(&north).await.unwrap();

    // Assert
    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::Validation(_)))
    ));
    assert_eq!(loaded.quantity("widget"), u32::MAX);
    assert_eq!(engine.events().head_position().unwrap(), 1);
}
