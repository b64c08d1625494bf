//! In-memory store implementations backing the service tests and local
//! development without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::product::{Product, ProductVariation, VariationStockStatus};
use crate::domain::stock::{StockKey, StockMovement, StockRecord, StockStats};
use crate::domain::sync::SyncIntent;
use crate::error::{InventoryError, Result};
use crate::store::{MovementStore, OutboxStore, ProductCatalog, StockStore};

#[derive(Default)]
pub struct MemoryStockStore {
    records: RwLock<HashMap<Uuid, StockRecord>>,
}

impl MemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for MemoryStockStore {
    async fn insert(&self, record: StockRecord) -> Result<StockRecord> {
        let mut records = self.records.write().await;
        let key = record.key();
        if records.values().any(|r| r.key() == key) {
            return Err(InventoryError::Conflict);
        }
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: Uuid) -> Result<Option<StockRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_key(&self, key: &StockKey) -> Result<Option<StockRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| &r.key() == key)
            .cloned())
    }

    async fn find_by_product(
        &self,
        product_id: Uuid,
        size: Option<&str>,
    ) -> Result<Vec<StockRecord>> {
        let records = self.records.read().await;
        let mut found: Vec<StockRecord> = records
            .values()
            .filter(|r| r.product_id == product_id)
            .filter(|r| size.is_none() || r.size.as_deref() == size)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }

    async fn list(&self, page: u32, per_page: u32) -> Result<(Vec<StockRecord>, i64)> {
        let records = self.records.read().await;
        let total = records.len() as i64;
        let mut all: Vec<StockRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let skip = (page.saturating_sub(1) as usize) * per_page as usize;
        Ok((
            all.into_iter().skip(skip).take(per_page as usize).collect(),
            total,
        ))
    }

    async fn list_low_stock(&self) -> Result<Vec<StockRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.is_low())
            .cloned()
            .collect())
    }

    async fn list_out_of_stock(&self) -> Result<Vec<StockRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.current_stock == 0)
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<StockStats> {
        let records = self.records.read().await;
        let total = records.len() as i64;
        let low_stock = records.values().filter(|r| r.is_low()).count() as i64;
        let out_of_stock = records.values().filter(|r| r.current_stock == 0).count() as i64;
        Ok(StockStats {
            total,
            low_stock,
            out_of_stock,
            in_stock: total - out_of_stock,
        })
    }

    async fn update(&self, record: &StockRecord, expected_version: i64) -> Result<StockRecord> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&record.id)
            .ok_or(InventoryError::NotFound("stock record"))?;
        if stored.version != expected_version {
            return Err(InventoryError::StaleVersion(record.id));
        }
        let mut updated = record.clone();
        updated.version = expected_version + 1;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryMovementStore {
    movements: RwLock<Vec<StockMovement>>,
}

impl MemoryMovementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MovementStore for MemoryMovementStore {
    async fn append(&self, movement: StockMovement) -> Result<StockMovement> {
        self.movements.write().await.push(movement.clone());
        Ok(movement)
    }

    async fn list_by_inventory(&self, inventory_id: Uuid) -> Result<Vec<StockMovement>> {
        // Reverse insertion order: newest first even for equal timestamps.
        Ok(self
            .movements
            .read()
            .await
            .iter()
            .rev()
            .filter(|m| m.inventory_id == inventory_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryOutboxStore {
    intents: RwLock<Vec<SyncIntent>>,
}

impl MemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn enqueue(&self, intent: SyncIntent) -> Result<SyncIntent> {
        self.intents.write().await.push(intent.clone());
        Ok(intent)
    }

    async fn pending(&self) -> Result<Vec<SyncIntent>> {
        Ok(self.intents.read().await.clone())
    }

    async fn mark_done(&self, id: Uuid) -> Result<()> {
        self.intents.write().await.retain(|i| i.id != id);
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        let mut intents = self.intents.write().await;
        if let Some(intent) = intents.iter_mut().find(|i| i.id == id) {
            intent.attempts += 1;
            intent.last_error = Some(error.to_string());
        }
        Ok(())
    }
}

/// In-memory stand-in for the product module, with seed helpers for tests
/// and local runs.
#[derive(Default)]
pub struct MemoryCatalog {
    products: RwLock<HashMap<Uuid, Product>>,
    variations: RwLock<HashMap<Uuid, ProductVariation>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_product(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    pub async fn upsert_variation(&self, variation: ProductVariation) {
        self.variations
            .write()
            .await
            .insert(variation.id, variation);
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list_variations(&self, product_id: Uuid) -> Result<Vec<ProductVariation>> {
        let variations = self.variations.read().await;
        let mut found: Vec<ProductVariation> = variations
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect();
        found.sort_by_key(|v| v.id);
        Ok(found)
    }

    async fn update_variation_stock(
        &self,
        variation_id: Uuid,
        stock_quantity: i32,
        status: VariationStockStatus,
    ) -> Result<()> {
        let mut variations = self.variations.write().await;
        let variation = variations
            .get_mut(&variation_id)
            .ok_or(InventoryError::NotFound("product variation"))?;
        variation.stock_quantity = stock_quantity;
        variation.stock_status = status;
        variation.updated_at = Utc::now();
        Ok(())
    }

    async fn set_product_stock(
        &self,
        product_id: Uuid,
        stock_quantity: i32,
        in_stock: bool,
    ) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&product_id)
            .ok_or(InventoryError::NotFound("product"))?;
        product.stock_quantity = stock_quantity;
        product.in_stock = in_stock;
        product.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::{MovementType, StockStatus};

    fn record(product_id: Uuid, warehouse: &str, size: Option<&str>) -> StockRecord {
        let now = Utc::now();
        StockRecord {
            id: Uuid::new_v4(),
            product_id,
            variation_id: None,
            size: size.map(str::to_string),
            warehouse_id: warehouse.to_string(),
            current_stock: 10,
            reserved_stock: 0,
            reorder_point: 3,
            reorder_quantity: 20,
            max_stock: None,
            status: StockStatus::InStock,
            last_restocked: None,
            last_sold: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_duplicate_line_key_conflicts() {
        let store = MemoryStockStore::new();
        let product_id = Uuid::new_v4();
        store.insert(record(product_id, "main", Some("S"))).await.unwrap();
        let err = store
            .insert(record(product_id, "main", Some("S")))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Conflict));
        // Same product, different size: no collision.
        store.insert(record(product_id, "main", Some("M"))).await.unwrap();
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_version() {
        let store = MemoryStockStore::new();
        let inserted = store.insert(record(Uuid::new_v4(), "main", None)).await.unwrap();

        let mut first = inserted.clone();
        first.current_stock = 8;
        let updated = store.update(&first, 1).await.unwrap();
        assert_eq!(updated.version, 2);

        // A writer still holding version 1 must lose.
        let mut second = inserted.clone();
        second.current_stock = 6;
        let err = store.update(&second, 1).await.unwrap_err();
        assert!(matches!(err, InventoryError::StaleVersion(_)));

        let stored = store.find(inserted.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 8);
    }

    #[tokio::test]
    async fn test_movements_listed_newest_first() {
        let store = MemoryMovementStore::new();
        let inventory_id = Uuid::new_v4();
        for (i, quantity) in [5, -2, 7].into_iter().enumerate() {
            store
                .append(StockMovement {
                    id: Uuid::new_v4(),
                    inventory_id,
                    movement_type: if quantity >= 0 { MovementType::In } else { MovementType::Out },
                    quantity,
                    reference_id: None,
                    reference_type: None,
                    notes: Some(format!("entry {i}")),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let listed = store.list_by_inventory(inventory_id).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].quantity, 7);
        assert_eq!(listed[2].quantity, 5);
    }
}
