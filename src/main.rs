//! Stockroom - Inventory and Stock Synchronization Service

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockroom::http::{router, AppState};
use stockroom::service::events::MovementEvents;
use stockroom::service::{InventoryService, SyncBridge};
use stockroom::store::postgres::{PgCatalog, PgMovementStore, PgOutboxStore, PgStockStore};
use stockroom::store::{MovementStore, OutboxStore, ProductCatalog, StockStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&std::env::var("DATABASE_URL")?)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match std::env::var("NATS_URL") {
        Ok(url) => async_nats::connect(&url).await.ok(),
        Err(_) => None,
    };
    let default_warehouse =
        std::env::var("DEFAULT_WAREHOUSE").unwrap_or_else(|_| "main".to_string());

    let stock: Arc<dyn StockStore> = Arc::new(PgStockStore::new(db.clone()));
    let movements: Arc<dyn MovementStore> = Arc::new(PgMovementStore::new(db.clone()));
    let catalog: Arc<dyn ProductCatalog> = Arc::new(PgCatalog::new(db.clone()));
    let outbox: Arc<dyn OutboxStore> = Arc::new(PgOutboxStore::new(db));

    let bridge = Arc::new(SyncBridge::new(
        stock.clone(),
        catalog.clone(),
        outbox,
        default_warehouse,
    ));
    let inventory = Arc::new(InventoryService::new(
        stock,
        movements,
        catalog,
        bridge.clone(),
        MovementEvents::new(nats),
    ));

    let app = router(AppState { inventory, bridge });

    let port = std::env::var("PORT").unwrap_or_else(|_| "8084".to_string());
    tracing::info!("stockroom listening on 0.0.0.0:{}", port);
    axum::serve(
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?,
        app,
    )
    .await?;
    Ok(())
}
