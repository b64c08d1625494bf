//! Storage ports for the ledger, movement log, outbox, and product catalog.
//!
//! Production wires the Postgres implementations; the service layer and
//! its tests run against the in-memory ones.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::product::{Product, ProductVariation, VariationStockStatus};
use crate::domain::stock::{StockKey, StockMovement, StockRecord, StockStats};
use crate::domain::sync::SyncIntent;
use crate::error::Result;

/// Durable store of stock records. All writes besides `insert` are
/// compare-and-swap on the record's `version` field and fail with
/// `StaleVersion` when the stored version moved.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Insert a new record; `Conflict` if the line key already exists.
    async fn insert(&self, record: StockRecord) -> Result<StockRecord>;

    async fn find(&self, id: Uuid) -> Result<Option<StockRecord>>;

    async fn find_by_key(&self, key: &StockKey) -> Result<Option<StockRecord>>;

    /// All records for a product, optionally narrowed to one size.
    async fn find_by_product(
        &self,
        product_id: Uuid,
        size: Option<&str>,
    ) -> Result<Vec<StockRecord>>;

    /// Page of records plus the total count, newest first.
    async fn list(&self, page: u32, per_page: u32) -> Result<(Vec<StockRecord>, i64)>;

    /// Records at or below their reorder point.
    async fn list_low_stock(&self) -> Result<Vec<StockRecord>>;

    /// Records with zero stock on hand.
    async fn list_out_of_stock(&self) -> Result<Vec<StockRecord>>;

    async fn stats(&self) -> Result<StockStats>;

    /// Compare-and-swap update: applies `record` only if the stored
    /// version equals `expected_version`, bumping version and `updated_at`.
    async fn update(&self, record: &StockRecord, expected_version: i64) -> Result<StockRecord>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Append-only movement log.
#[async_trait]
pub trait MovementStore: Send + Sync {
    async fn append(&self, movement: StockMovement) -> Result<StockMovement>;

    /// Movements for one record, newest first.
    async fn list_by_inventory(&self, inventory_id: Uuid) -> Result<Vec<StockMovement>>;
}

/// Durable outbox of pending ledger-to-product syncs.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn enqueue(&self, intent: SyncIntent) -> Result<SyncIntent>;

    async fn pending(&self) -> Result<Vec<SyncIntent>>;

    async fn mark_done(&self, id: Uuid) -> Result<()>;

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()>;
}

/// Narrow port into the product module: the only surface the bridge and
/// ledger are allowed to touch.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;

    async fn list_variations(&self, product_id: Uuid) -> Result<Vec<ProductVariation>>;

    async fn update_variation_stock(
        &self,
        variation_id: Uuid,
        stock_quantity: i32,
        status: VariationStockStatus,
    ) -> Result<()>;

    /// Write the product-level denormalized aggregate.
    async fn set_product_stock(
        &self,
        product_id: Uuid,
        stock_quantity: i32,
        in_stock: bool,
    ) -> Result<()>;
}
