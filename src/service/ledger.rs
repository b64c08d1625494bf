//! Stock Ledger operations.
//!
//! Every mutation is a compare-and-swap on the record's version field,
//! retried a bounded number of times, so concurrent adjustments on the
//! same record are linearizable instead of last-write-wins.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::domain::stock::{derive_status, StockMovement, StockRecord, StockStats};
use crate::error::{InventoryError, Result};
use crate::service::dto::{AdjustStockDto, CreateInventoryDto, UpdateInventoryDto};
use crate::service::events::MovementEvents;
use crate::service::sync::SyncBridge;
use crate::store::{MovementStore, ProductCatalog, StockStore};

pub(crate) const MAX_CAS_RETRIES: usize = 3;

/// Ledger record enriched with catalog fields for listing endpoints.
#[derive(Debug, Serialize)]
pub struct InventoryView {
    #[serde(flatten)]
    pub record: StockRecord,
    pub product_name: Option<String>,
    pub product_sku: Option<String>,
}

pub struct InventoryService {
    pub(crate) stock: Arc<dyn StockStore>,
    pub(crate) movements: Arc<dyn MovementStore>,
    pub(crate) catalog: Arc<dyn ProductCatalog>,
    pub(crate) bridge: Arc<SyncBridge>,
    pub(crate) events: MovementEvents,
}

impl InventoryService {
    pub fn new(
        stock: Arc<dyn StockStore>,
        movements: Arc<dyn MovementStore>,
        catalog: Arc<dyn ProductCatalog>,
        bridge: Arc<SyncBridge>,
        events: MovementEvents,
    ) -> Self {
        Self {
            stock,
            movements,
            catalog,
            bridge,
            events,
        }
    }

    pub async fn create_inventory(&self, dto: CreateInventoryDto) -> Result<StockRecord> {
        let allow_backorders = self.allow_backorders(dto.product_id).await;
        let now = Utc::now();
        let record = StockRecord {
            id: Uuid::new_v4(),
            product_id: dto.product_id,
            variation_id: dto.variation_id,
            size: dto.size,
            warehouse_id: dto.warehouse_id,
            current_stock: dto.current_stock,
            reserved_stock: dto.reserved_stock.unwrap_or(0),
            reorder_point: dto.reorder_point,
            reorder_quantity: dto.reorder_quantity,
            max_stock: dto.max_stock,
            status: derive_status(dto.current_stock, dto.reorder_point, allow_backorders),
            last_restocked: (dto.current_stock > 0).then_some(now),
            last_sold: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let record = self.stock.insert(record).await?;
        info!(record_id = %record.id, product_id = %record.product_id, "stock record created");
        self.bridge.push_to_product(record.product_id).await;
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> Result<StockRecord> {
        self.stock
            .find(id)
            .await?
            .ok_or(InventoryError::NotFound("stock record"))
    }

    pub async fn find_by_product(
        &self,
        product_id: Uuid,
        size: Option<&str>,
    ) -> Result<Vec<StockRecord>> {
        self.stock.find_by_product(product_id, size).await
    }

    pub async fn list(&self, page: u32, per_page: u32) -> Result<(Vec<InventoryView>, i64)> {
        let (records, total) = self.stock.list(page, per_page).await?;
        Ok((self.enrich(records).await?, total))
    }

    pub async fn low_stock(&self) -> Result<Vec<InventoryView>> {
        let records = self.stock.list_low_stock().await?;
        self.enrich(records).await
    }

    pub async fn out_of_stock(&self) -> Result<Vec<InventoryView>> {
        let records = self.stock.list_out_of_stock().await?;
        self.enrich(records).await
    }

    pub async fn stats(&self) -> Result<StockStats> {
        self.stock.stats().await
    }

    pub async fn update_inventory(&self, id: Uuid, dto: UpdateInventoryDto) -> Result<StockRecord> {
        let mut attempts = 0;
        let updated = loop {
            let mut record = self.get(id).await?;
            let expected = record.version;

            if let Some(current_stock) = dto.current_stock {
                record.current_stock = current_stock;
            }
            if let Some(reserved_stock) = dto.reserved_stock {
                record.reserved_stock = reserved_stock;
            }
            if let Some(reorder_point) = dto.reorder_point {
                record.reorder_point = reorder_point;
            }
            if let Some(reorder_quantity) = dto.reorder_quantity {
                record.reorder_quantity = reorder_quantity;
            }
            if let Some(max_stock) = dto.max_stock {
                record.max_stock = Some(max_stock);
            }
            match dto.status {
                // Explicit status wins; this is how records get
                // discontinued (and un-discontinued).
                Some(status) => record.status = status,
                None => {
                    if dto.current_stock.is_some() || dto.reorder_point.is_some() {
                        let allow_backorders = self.allow_backorders(record.product_id).await;
                        record.refresh_status(allow_backorders);
                    }
                }
            }

            match self.stock.update(&record, expected).await {
                Ok(updated) => break updated,
                Err(InventoryError::StaleVersion(_)) if attempts + 1 < MAX_CAS_RETRIES => {
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        };

        if dto.current_stock.is_some() || dto.status.is_some() {
            self.bridge.push_to_product(updated.product_id).await;
        }
        Ok(updated)
    }

    pub async fn adjust_stock(&self, id: Uuid, dto: AdjustStockDto) -> Result<StockRecord> {
        if dto.quantity == 0 {
            return Err(InventoryError::InvalidOperation(
                "adjustment quantity must be non-zero".into(),
            ));
        }

        let mut attempts = 0;
        let updated = loop {
            let mut record = self.get(id).await?;
            let expected = record.version;
            let new_stock = record.current_stock + dto.quantity;
            if new_stock < 0 {
                return Err(InventoryError::InvalidOperation(format!(
                    "insufficient stock for adjustment: current {}, delta {}",
                    record.current_stock, dto.quantity
                )));
            }
            record.current_stock = new_stock;
            let now = Utc::now();
            if dto.quantity > 0 {
                record.last_restocked = Some(now);
            } else {
                record.last_sold = Some(now);
            }
            let allow_backorders = self.allow_backorders(record.product_id).await;
            record.refresh_status(allow_backorders);

            match self.stock.update(&record, expected).await {
                Ok(updated) => break updated,
                Err(InventoryError::StaleVersion(_)) if attempts + 1 < MAX_CAS_RETRIES => {
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let movement = self
            .movements
            .append(StockMovement {
                id: Uuid::new_v4(),
                inventory_id: id,
                movement_type: dto.movement_type,
                quantity: dto.quantity,
                reference_id: dto.reference_id,
                reference_type: dto.reference_type,
                notes: dto.notes,
                created_at: Utc::now(),
            })
            .await?;
        self.events.publish(&movement).await;
        info!(
            record_id = %id,
            delta = dto.quantity,
            current_stock = updated.current_stock,
            "stock adjusted"
        );

        self.bridge.push_to_product(updated.product_id).await;
        Ok(updated)
    }

    /// Direct set used by order reservation flows. Reservation is not
    /// checked against `current_stock`; available stock can go negative.
    pub async fn set_reserved(&self, id: Uuid, reserved_stock: i32) -> Result<StockRecord> {
        if reserved_stock < 0 {
            return Err(InventoryError::InvalidOperation(
                "reserved stock cannot be negative".into(),
            ));
        }
        let mut attempts = 0;
        loop {
            let mut record = self.get(id).await?;
            let expected = record.version;
            record.reserved_stock = reserved_stock;
            match self.stock.update(&record, expected).await {
                Ok(updated) => return Ok(updated),
                Err(InventoryError::StaleVersion(_)) if attempts + 1 < MAX_CAS_RETRIES => {
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn delete_inventory(&self, id: Uuid) -> Result<()> {
        if !self.stock.delete(id).await? {
            return Err(InventoryError::NotFound("stock record"));
        }
        info!(record_id = %id, "stock record deleted");
        Ok(())
    }

    pub async fn movements(&self, id: Uuid) -> Result<Vec<StockMovement>> {
        // 404 for unknown records rather than an empty audit trail.
        self.get(id).await?;
        self.movements.list_by_inventory(id).await
    }

    pub(crate) async fn allow_backorders(&self, product_id: Uuid) -> bool {
        match self.catalog.find_product(product_id).await {
            Ok(Some(product)) => product.allow_backorders,
            _ => false,
        }
    }

    async fn enrich(&self, records: Vec<StockRecord>) -> Result<Vec<InventoryView>> {
        let mut names: HashMap<Uuid, Option<(String, String)>> = HashMap::new();
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            if !names.contains_key(&record.product_id) {
                let found = self
                    .catalog
                    .find_product(record.product_id)
                    .await?
                    .map(|p| (p.name, p.sku));
                names.insert(record.product_id, found);
            }
            let product = names.get(&record.product_id).and_then(|p| p.clone());
            views.push(InventoryView {
                record,
                product_name: product.as_ref().map(|(name, _)| name.clone()),
                product_sku: product.map(|(_, sku)| sku),
            });
        }
        Ok(views)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::product::Product;
    use crate::domain::stock::{MovementType, StockStatus};
    use crate::store::memory::{
        MemoryCatalog, MemoryMovementStore, MemoryOutboxStore, MemoryStockStore,
    };

    pub(crate) struct Fixture {
        pub stock: Arc<MemoryStockStore>,
        pub movements: Arc<MemoryMovementStore>,
        pub catalog: Arc<MemoryCatalog>,
        pub service: InventoryService,
    }

    pub(crate) fn fixture() -> Fixture {
        let stock = Arc::new(MemoryStockStore::new());
        let movements = Arc::new(MemoryMovementStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let outbox = Arc::new(MemoryOutboxStore::new());
        let bridge = Arc::new(SyncBridge::new(
            stock.clone(),
            catalog.clone(),
            outbox,
            "main",
        ));
        let service = InventoryService::new(
            stock.clone(),
            movements.clone(),
            catalog.clone(),
            bridge,
            MovementEvents::disabled(),
        );
        Fixture {
            stock,
            movements,
            catalog,
            service,
        }
    }

    pub(crate) fn create_dto(
        product_id: Uuid,
        warehouse: &str,
        current_stock: i32,
        reorder_point: i32,
    ) -> CreateInventoryDto {
        CreateInventoryDto {
            product_id,
            variation_id: None,
            size: None,
            current_stock,
            reserved_stock: None,
            reorder_point,
            reorder_quantity: 20,
            max_stock: None,
            warehouse_id: warehouse.to_string(),
        }
    }

    fn adjust(quantity: i32) -> AdjustStockDto {
        AdjustStockDto {
            quantity,
            movement_type: if quantity >= 0 {
                MovementType::In
            } else {
                MovementType::Out
            },
            reference_id: None,
            reference_type: Some("ADJUSTMENT".into()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_adjustment_applies_delta() {
        let f = fixture();
        let record = f
            .service
            .create_inventory(create_dto(Uuid::new_v4(), "main", 10, 3))
            .await
            .unwrap();

        let updated = f.service.adjust_stock(record.id, adjust(5)).await.unwrap();
        assert_eq!(updated.current_stock, 15);
        assert!(updated.last_restocked.is_some());

        let updated = f.service.adjust_stock(record.id, adjust(-15)).await.unwrap();
        assert_eq!(updated.current_stock, 0);
        assert_eq!(updated.status, StockStatus::OutOfStock);
        assert!(updated.last_sold.is_some());
    }

    #[tokio::test]
    async fn test_overdraw_rejected_and_record_unchanged() {
        let f = fixture();
        let record = f
            .service
            .create_inventory(create_dto(Uuid::new_v4(), "main", 20, 5))
            .await
            .unwrap();

        let err = f.service.adjust_stock(record.id, adjust(-25)).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidOperation(_)));

        let unchanged = f.service.get(record.id).await.unwrap();
        assert_eq!(unchanged.current_stock, 20);
        assert_eq!(unchanged.version, record.version);
        assert!(f.movements.list_by_inventory(record.id).await.unwrap().is_empty());

        // The in-range follow-up lands and crosses into low stock.
        let updated = f.service.adjust_stock(record.id, adjust(-15)).await.unwrap();
        assert_eq!(updated.current_stock, 5);
        assert_eq!(updated.status, StockStatus::LowStock);

        let movements = f.movements.list_by_inventory(record.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Out);
        assert_eq!(movements[0].quantity, -15);
    }

    #[tokio::test]
    async fn test_create_duplicate_line_conflicts() {
        let f = fixture();
        let product_id = Uuid::new_v4();
        f.service
            .create_inventory(create_dto(product_id, "main", 10, 3))
            .await
            .unwrap();
        let err = f
            .service
            .create_inventory(create_dto(product_id, "main", 4, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Conflict));
    }

    #[tokio::test]
    async fn test_zero_adjustment_rejected() {
        let f = fixture();
        let record = f
            .service
            .create_inventory(create_dto(Uuid::new_v4(), "main", 10, 3))
            .await
            .unwrap();
        let err = f.service.adjust_stock(record.id, adjust(0)).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_set_reserved_allows_overbooking() {
        let f = fixture();
        let record = f
            .service
            .create_inventory(create_dto(Uuid::new_v4(), "main", 5, 3))
            .await
            .unwrap();
        let updated = f.service.set_reserved(record.id, 8).await.unwrap();
        assert_eq!(updated.reserved_stock, 8);
        assert_eq!(updated.available_stock(), -3);

        let err = f.service.set_reserved(record.id, -1).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_update_rederives_status_unless_explicit() {
        let f = fixture();
        let record = f
            .service
            .create_inventory(create_dto(Uuid::new_v4(), "main", 50, 5))
            .await
            .unwrap();
        assert_eq!(record.status, StockStatus::InStock);

        let updated = f
            .service
            .update_inventory(
                record.id,
                UpdateInventoryDto {
                    current_stock: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, StockStatus::LowStock);

        let updated = f
            .service
            .update_inventory(
                record.id,
                UpdateInventoryDto {
                    status: Some(StockStatus::Discontinued),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, StockStatus::Discontinued);

        // Adjustments never revive a discontinued record's status.
        let adjusted = f.service.adjust_stock(record.id, adjust(100)).await.unwrap();
        assert_eq!(adjusted.status, StockStatus::Discontinued);
    }

    #[tokio::test]
    async fn test_backorderable_product_stays_in_stock_at_zero() {
        let f = fixture();
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            sku: "B-1".into(),
            name: "Backorderable".into(),
            manage_stock: true,
            allow_backorders: true,
            available_sizes: vec![],
            size_inventory: vec![],
            stock_quantity: 0,
            in_stock: true,
            created_at: now,
            updated_at: now,
        };
        f.catalog.upsert_product(product.clone()).await;

        let record = f
            .service
            .create_inventory(create_dto(product.id, "main", 5, 2))
            .await
            .unwrap();
        let updated = f.service.adjust_stock(record.id, adjust(-5)).await.unwrap();
        assert_eq!(updated.current_stock, 0);
        assert_eq!(updated.status, StockStatus::InStock);
    }

    #[tokio::test]
    async fn test_delete_missing_record_not_found() {
        let f = fixture();
        let err = f.service.delete_inventory(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stats_and_queries() {
        let f = fixture();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        f.service.create_inventory(create_dto(a, "main", 50, 5)).await.unwrap();
        f.service.create_inventory(create_dto(b, "main", 2, 5)).await.unwrap();
        f.service.create_inventory(create_dto(c, "main", 0, 5)).await.unwrap();

        let stats = f.service.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.low_stock, 2); // the zero record is also at/below reorder
        assert_eq!(stats.out_of_stock, 1);
        assert_eq!(stats.in_stock, 2);

        assert_eq!(f.service.low_stock().await.unwrap().len(), 2);
        assert_eq!(f.service.out_of_stock().await.unwrap().len(), 1);

        let (page, total) = f.service.list(1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
    }
}
