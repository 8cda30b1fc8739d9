//! Keel demo entry point: a scripted warehouse session.

use std::error::Error;
use std::sync::Arc;

use keel_core::aggregate::AggregateRoot;
use keel_core::clock::SystemClock;
use keel_core::identity::{Identifier, UuidIdentifierFactory};
use keel_core::listener::EventListener;
use keel_demo::app::Engine;
use keel_demo::config::{DemoConfig, LogFormat};
use keel_demo::domain::{RestockProcess, StockLevels};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt().with_env_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Read configuration from environment.
    let config = DemoConfig::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(
        snapshot_every = config.snapshot_every,
        replay_batch = config.replay_batch,
        "Starting Keel demo"
    );

    let engine = Engine::new(
        &config,
        Arc::new(SystemClock),
        Arc::new(UuidIdentifierFactory),
    );
    let north = Identifier::new("warehouse-north");
    let south = Identifier::new("warehouse-south");

    engine
        .execute(&north, |inv, ctx| {
            inv.stock_item("widget", 10, ctx)?;
            inv.stock_item("gadget", 2, ctx)
        })
        .await?;
    engine
        .execute(&south, |inv, ctx| inv.stock_item("widget", 4, ctx))
        .await?;
    engine
        .execute(&north, |inv, ctx| inv.remove_item("gadget", 2, ctx))
        .await?;

    let levels = engine
        .project(StockLevels::new(engine.listener_id("stock-levels")))
        .await?;
    let restock = engine
        .project(RestockProcess::new(engine.listener_id("restock")))
        .await?;
    tracing::info!(
        widgets = levels.total("widget"),
        gadgets = levels.total("gadget"),
        open_restocks = restock.open_requests().count(),
        "stock after first round"
    );

    engine
        .execute(&north, |inv, ctx| inv.stock_item("gadget", 5, ctx))
        .await?;
    let levels = engine.project(levels).await?;
    let restock = engine.project(restock).await?;

    let north_inventory = engine.load_inventory(&north).await?;
    let head_position = engine.events().head_position()?;
    let snapshots = engine.snapshots().len()?;
    tracing::info!(
        gadgets = levels.total("gadget"),
        restock_completed = restock.subscription().is_completed(),
        north_version = north_inventory.version(),
        head_position,
        snapshots,
        "demo finished"
    );

    Ok(())
}
