//! Product↔Inventory Sync Bridge.
//!
//! Keeps the denormalized stock fields on products and variations
//! consistent with the stock ledger, in both directions. The ledger is
//! the source of truth; product-side fields are a cache.
//!
//! Both directions are best-effort from the caller's point of view: a
//! product or stock write never fails because its sync side-effect did.
//! The ledger→product direction goes through a durable outbox so a failed
//! sync stays visible and retryable instead of being lost.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::product::Product;
use crate::domain::stock::{derive_status, StockKey, StockRecord};
use crate::domain::sync::SyncIntent;
use crate::error::{InventoryError, Result};
use crate::store::{OutboxStore, ProductCatalog, StockStore};

/// Reorder defaults for records the bridge creates from product stock
/// lines; admin-created records carry their own.
const DEFAULT_REORDER_POINT: i32 = 5;
const DEFAULT_REORDER_QUANTITY: i32 = 10;

pub struct SyncBridge {
    stock: Arc<dyn StockStore>,
    catalog: Arc<dyn ProductCatalog>,
    outbox: Arc<dyn OutboxStore>,
    default_warehouse: String,
}

impl SyncBridge {
    pub fn new(
        stock: Arc<dyn StockStore>,
        catalog: Arc<dyn ProductCatalog>,
        outbox: Arc<dyn OutboxStore>,
        default_warehouse: impl Into<String>,
    ) -> Self {
        Self {
            stock,
            catalog,
            outbox,
            default_warehouse: default_warehouse.into(),
        }
    }

    /// Product→ledger direction, called after a product create/update.
    /// Errors are logged and swallowed: the product write already happened
    /// and must not be failed retroactively. Re-running is idempotent
    /// because quantities are applied as absolute values.
    pub async fn sync_to_inventory(&self, product: &Product) {
        if let Err(e) = self.apply_product_lines(product).await {
            let e = InventoryError::SyncFailure(e.to_string());
            warn!(product_id = %product.id, error = %e, "product to inventory sync failed");
        }
    }

    /// Load a product and run the product→ledger sync for it.
    pub async fn sync_product_by_id(&self, product_id: Uuid) -> Result<()> {
        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .ok_or(InventoryError::NotFound("product"))?;
        self.sync_to_inventory(&product).await;
        Ok(())
    }

    async fn apply_product_lines(&self, product: &Product) -> Result<()> {
        if !product.manage_stock {
            return Ok(());
        }

        for line in product.stock_lines() {
            let size = (!line.size.is_empty()).then(|| line.size.clone());
            let key = StockKey {
                product_id: product.id,
                variation_id: None,
                warehouse_id: self.default_warehouse.clone(),
                size: size.clone(),
            };
            match self.stock.find_by_key(&key).await? {
                Some(mut record) => {
                    let mut desired = record.clone();
                    desired.current_stock = line.quantity;
                    desired.refresh_status(product.allow_backorders);
                    // Unchanged lines are skipped so re-running the sync
                    // leaves version and updated_at untouched.
                    if desired.current_stock == record.current_stock
                        && desired.status == record.status
                    {
                        continue;
                    }
                    record.current_stock = desired.current_stock;
                    record.status = desired.status;
                    let expected = record.version;
                    self.stock.update(&record, expected).await?;
                }
                None => {
                    let now = chrono::Utc::now();
                    let record = StockRecord {
                        id: Uuid::new_v4(),
                        product_id: product.id,
                        variation_id: None,
                        size,
                        warehouse_id: self.default_warehouse.clone(),
                        current_stock: line.quantity,
                        reserved_stock: 0,
                        reorder_point: DEFAULT_REORDER_POINT,
                        reorder_quantity: DEFAULT_REORDER_QUANTITY,
                        max_stock: None,
                        status: derive_status(
                            line.quantity,
                            DEFAULT_REORDER_POINT,
                            product.allow_backorders,
                        ),
                        last_restocked: (line.quantity > 0).then_some(now),
                        last_sold: None,
                        version: 1,
                        created_at: now,
                        updated_at: now,
                    };
                    self.stock.insert(record).await?;
                }
            }
        }

        self.remove_stale_size_records(product).await
    }

    /// Delete bridge-owned size records for sizes the product no longer
    /// offers. Only touches no-variation records at the default warehouse.
    async fn remove_stale_size_records(&self, product: &Product) -> Result<()> {
        for record in self.stock.find_by_product(product.id, None).await? {
            if record.variation_id.is_some() || record.warehouse_id != self.default_warehouse {
                continue;
            }
            let Some(size) = &record.size else { continue };
            if !product.available_sizes.contains(size) {
                debug!(product_id = %product.id, size, "removing stock record for dropped size");
                self.stock.delete(record.id).await?;
            }
        }
        Ok(())
    }

    /// Ledger→product direction, called after adjustments and transfers.
    /// Enqueues a durable intent, then tries to apply it immediately;
    /// failures leave the intent pending for a later flush.
    pub async fn push_to_product(&self, product_id: Uuid) {
        let intent = match self.outbox.enqueue(SyncIntent::new(product_id)).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(%product_id, error = %e, "failed to enqueue product sync intent");
                return;
            }
        };
        self.try_apply(&intent).await;
    }

    /// Retry every pending intent; returns how many applied.
    pub async fn flush_pending(&self) -> Result<usize> {
        let mut applied = 0;
        for intent in self.outbox.pending().await? {
            if self.try_apply(&intent).await {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Pending intents, for observability endpoints.
    pub async fn pending_intents(&self) -> Result<Vec<SyncIntent>> {
        self.outbox.pending().await
    }

    async fn try_apply(&self, intent: &SyncIntent) -> bool {
        match self.apply_to_product(intent.product_id).await {
            Ok(()) => {
                if let Err(e) = self.outbox.mark_done(intent.id).await {
                    warn!(intent_id = %intent.id, error = %e, "failed to mark sync intent done");
                }
                true
            }
            Err(e) => {
                let e = InventoryError::SyncFailure(e.to_string());
                warn!(
                    product_id = %intent.product_id,
                    attempts = intent.attempts,
                    error = %e,
                    "ledger to product sync failed"
                );
                if let Err(e) = self.outbox.mark_failed(intent.id, &e.to_string()).await {
                    warn!(intent_id = %intent.id, error = %e, "failed to mark sync intent failed");
                }
                false
            }
        }
    }

    /// Push ledger aggregates onto the product and each of its
    /// variations. Every variation with ledger lines is synced, not just
    /// the first one found.
    async fn apply_to_product(&self, product_id: Uuid) -> Result<()> {
        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .ok_or(InventoryError::NotFound("product"))?;
        if !product.manage_stock {
            return Ok(());
        }

        let records = self.stock.find_by_product(product_id, None).await?;

        for variation in self.catalog.list_variations(product_id).await? {
            let lines: Vec<&StockRecord> = records
                .iter()
                .filter(|r| r.variation_id == Some(variation.id))
                .collect();
            if lines.is_empty() {
                continue;
            }
            let quantity: i32 = lines.iter().map(|r| r.current_stock).sum();
            let reorder_point = lines.iter().map(|r| r.reorder_point).max().unwrap_or(0);
            let status = derive_status(quantity, reorder_point, product.allow_backorders);
            self.catalog
                .update_variation_stock(variation.id, quantity, status.into())
                .await?;
        }

        let total: i32 = records.iter().map(|r| r.current_stock).sum();
        let in_stock = total > 0 || product.allow_backorders;
        self.catalog
            .set_product_stock(product_id, total, in_stock)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{ProductVariation, SizeQuantity, VariationStockStatus};
    use crate::domain::stock::StockStatus;
    use crate::store::memory::{MemoryCatalog, MemoryOutboxStore, MemoryStockStore};
    use chrono::Utc;
    use rust_decimal::Decimal;

    struct Fixture {
        stock: Arc<MemoryStockStore>,
        catalog: Arc<MemoryCatalog>,
        outbox: Arc<MemoryOutboxStore>,
        bridge: SyncBridge,
    }

    fn fixture() -> Fixture {
        let stock = Arc::new(MemoryStockStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let outbox = Arc::new(MemoryOutboxStore::new());
        let bridge = SyncBridge::new(
            stock.clone(),
            catalog.clone(),
            outbox.clone(),
            "main",
        );
        Fixture {
            stock,
            catalog,
            outbox,
            bridge,
        }
    }

    fn sized_product(sizes: &[&str], inventory: &[(&str, i32)]) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            sku: "TEE-1".into(),
            name: "Tee".into(),
            manage_stock: true,
            allow_backorders: false,
            available_sizes: sizes.iter().map(|s| s.to_string()).collect(),
            size_inventory: inventory
                .iter()
                .map(|(size, quantity)| SizeQuantity {
                    size: size.to_string(),
                    quantity: *quantity,
                })
                .collect(),
            stock_quantity: 0,
            in_stock: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn variation(product_id: Uuid) -> ProductVariation {
        ProductVariation {
            id: Uuid::new_v4(),
            product_id,
            sku: None,
            price: Decimal::new(1999, 2),
            stock_quantity: 0,
            stock_status: VariationStockStatus::OutOfStock,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_sized_product_creates_one_record_per_size() {
        let f = fixture();
        let product = sized_product(&["S", "M"], &[("S", 10), ("M", 0)]);
        f.bridge.sync_to_inventory(&product).await;

        let records = f.stock.find_by_product(product.id, None).await.unwrap();
        assert_eq!(records.len(), 2);
        let s = records.iter().find(|r| r.size.as_deref() == Some("S")).unwrap();
        let m = records.iter().find(|r| r.size.as_deref() == Some("M")).unwrap();
        assert_eq!(s.current_stock, 10);
        assert_eq!(s.status, StockStatus::InStock);
        assert_eq!(m.current_stock, 0);
        assert_eq!(m.status, StockStatus::OutOfStock);
    }

    #[tokio::test]
    async fn test_removed_size_deletes_its_record_and_leaves_others() {
        let f = fixture();
        let mut product = sized_product(&["S", "M"], &[("S", 10), ("M", 0)]);
        f.bridge.sync_to_inventory(&product).await;

        let before = f.stock.find_by_product(product.id, Some("S")).await.unwrap();
        assert_eq!(before.len(), 1);
        let s_before = before[0].clone();

        product.available_sizes = vec!["S".into()];
        product.size_inventory.retain(|line| line.size == "S");
        f.bridge.sync_to_inventory(&product).await;

        let records = f.stock.find_by_product(product.id, None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size.as_deref(), Some("S"));
        // The surviving record was not rewritten.
        assert_eq!(records[0].version, s_before.version);
        assert_eq!(records[0].updated_at, s_before.updated_at);
    }

    #[tokio::test]
    async fn test_resync_with_unchanged_state_is_idempotent() {
        let f = fixture();
        let product = sized_product(&["S"], &[("S", 10)]);
        f.bridge.sync_to_inventory(&product).await;
        let first = f.stock.find_by_product(product.id, Some("S")).await.unwrap()[0].clone();

        f.bridge.sync_to_inventory(&product).await;
        let second = f.stock.find_by_product(product.id, Some("S")).await.unwrap()[0].clone();

        assert_eq!(second.version, first.version);
        assert_eq!(second.updated_at, first.updated_at);
    }

    #[tokio::test]
    async fn test_manage_stock_disabled_is_a_noop() {
        let f = fixture();
        let mut product = sized_product(&["S"], &[("S", 10)]);
        product.manage_stock = false;
        f.bridge.sync_to_inventory(&product).await;
        assert!(f.stock.find_by_product(product.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_to_product_syncs_every_variation() {
        let f = fixture();
        let product = sized_product(&[], &[]);
        f.catalog.upsert_product(product.clone()).await;
        let first = variation(product.id);
        let second = variation(product.id);
        f.catalog.upsert_variation(first.clone()).await;
        f.catalog.upsert_variation(second.clone()).await;

        let now = Utc::now();
        for (variation_id, quantity) in [(first.id, 12), (second.id, 0)] {
            f.stock
                .insert(StockRecord {
                    id: Uuid::new_v4(),
                    product_id: product.id,
                    variation_id: Some(variation_id),
                    size: None,
                    warehouse_id: "main".into(),
                    current_stock: quantity,
                    reserved_stock: 0,
                    reorder_point: 3,
                    reorder_quantity: 10,
                    max_stock: None,
                    status: derive_status(quantity, 3, false),
                    last_restocked: None,
                    last_sold: None,
                    version: 1,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        f.bridge.push_to_product(product.id).await;

        let variations = f.catalog.list_variations(product.id).await.unwrap();
        let synced_first = variations.iter().find(|v| v.id == first.id).unwrap();
        let synced_second = variations.iter().find(|v| v.id == second.id).unwrap();
        assert_eq!(synced_first.stock_quantity, 12);
        assert_eq!(synced_first.stock_status, VariationStockStatus::InStock);
        assert_eq!(synced_second.stock_quantity, 0);
        assert_eq!(synced_second.stock_status, VariationStockStatus::OutOfStock);

        let synced_product = f.catalog.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(synced_product.stock_quantity, 12);
        assert!(synced_product.in_stock);
        assert!(f.outbox.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_push_keeps_intent_pending_until_flush() {
        let f = fixture();
        let product = sized_product(&[], &[]);
        // Product not in the catalog yet: the push must fail but keep
        // the intent with its error instead of dropping it.
        f.bridge.push_to_product(product.id).await;

        let pending = f.outbox.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0].last_error.is_some());

        f.catalog.upsert_product(product.clone()).await;
        let applied = f.bridge.flush_pending().await.unwrap();
        assert_eq!(applied, 1);
        assert!(f.outbox.pending().await.unwrap().is_empty());
    }
}
