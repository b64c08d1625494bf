//! Postgres store implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::product::{Product, ProductVariation, SizeQuantity, VariationStockStatus};
use crate::domain::stock::{StockKey, StockMovement, StockRecord, StockStats};
use crate::domain::sync::SyncIntent;
use crate::error::{InventoryError, Result};
use crate::store::{MovementStore, OutboxStore, ProductCatalog, StockStore};

#[derive(Clone)]
pub struct PgStockStore {
    pool: PgPool,
}

impl PgStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockStore for PgStockStore {
    async fn insert(&self, record: StockRecord) -> Result<StockRecord> {
        let inserted = sqlx::query_as::<_, StockRecord>(
            "INSERT INTO stock_records \
             (id, product_id, variation_id, size, warehouse_id, current_stock, reserved_stock, \
              reorder_point, reorder_quantity, max_stock, status, last_restocked, last_sold, \
              version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING *",
        )
        .bind(record.id)
        .bind(record.product_id)
        .bind(record.variation_id)
        .bind(&record.size)
        .bind(&record.warehouse_id)
        .bind(record.current_stock)
        .bind(record.reserved_stock)
        .bind(record.reorder_point)
        .bind(record.reorder_quantity)
        .bind(record.max_stock)
        .bind(record.status)
        .bind(record.last_restocked)
        .bind(record.last_sold)
        .bind(record.version)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn find(&self, id: Uuid) -> Result<Option<StockRecord>> {
        Ok(
            sqlx::query_as::<_, StockRecord>("SELECT * FROM stock_records WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_by_key(&self, key: &StockKey) -> Result<Option<StockRecord>> {
        Ok(sqlx::query_as::<_, StockRecord>(
            "SELECT * FROM stock_records \
             WHERE product_id = $1 AND variation_id IS NOT DISTINCT FROM $2 \
               AND warehouse_id = $3 AND size IS NOT DISTINCT FROM $4",
        )
        .bind(key.product_id)
        .bind(key.variation_id)
        .bind(&key.warehouse_id)
        .bind(&key.size)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_by_product(
        &self,
        product_id: Uuid,
        size: Option<&str>,
    ) -> Result<Vec<StockRecord>> {
        Ok(sqlx::query_as::<_, StockRecord>(
            "SELECT * FROM stock_records \
             WHERE product_id = $1 AND ($2::text IS NULL OR size = $2) \
             ORDER BY created_at",
        )
        .bind(product_id)
        .bind(size)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list(&self, page: u32, per_page: u32) -> Result<(Vec<StockRecord>, i64)> {
        let records = sqlx::query_as::<_, StockRecord>(
            "SELECT * FROM stock_records ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(per_page as i64)
        .bind((page.saturating_sub(1) as i64) * per_page as i64)
        .fetch_all(&self.pool)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stock_records")
            .fetch_one(&self.pool)
            .await?;
        Ok((records, total.0))
    }

    async fn list_low_stock(&self) -> Result<Vec<StockRecord>> {
        Ok(sqlx::query_as::<_, StockRecord>(
            "SELECT * FROM stock_records WHERE current_stock <= reorder_point",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_out_of_stock(&self) -> Result<Vec<StockRecord>> {
        Ok(
            sqlx::query_as::<_, StockRecord>("SELECT * FROM stock_records WHERE current_stock = 0")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn stats(&self) -> Result<StockStats> {
        let (total, low_stock, out_of_stock): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE current_stock <= reorder_point), \
                    COUNT(*) FILTER (WHERE current_stock = 0) \
             FROM stock_records",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StockStats {
            total,
            low_stock,
            out_of_stock,
            in_stock: total - out_of_stock,
        })
    }

    async fn update(&self, record: &StockRecord, expected_version: i64) -> Result<StockRecord> {
        let updated = sqlx::query_as::<_, StockRecord>(
            "UPDATE stock_records SET \
                current_stock = $2, reserved_stock = $3, reorder_point = $4, \
                reorder_quantity = $5, max_stock = $6, status = $7, \
                last_restocked = $8, last_sold = $9, \
                version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $10 \
             RETURNING *",
        )
        .bind(record.id)
        .bind(record.current_stock)
        .bind(record.reserved_stock)
        .bind(record.reorder_point)
        .bind(record.reorder_quantity)
        .bind(record.max_stock)
        .bind(record.status)
        .bind(record.last_restocked)
        .bind(record.last_sold)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;
        match updated {
            Some(updated) => Ok(updated),
            // Distinguish a missing record from a lost CAS race.
            None => match self.find(record.id).await? {
                Some(_) => Err(InventoryError::StaleVersion(record.id)),
                None => Err(InventoryError::NotFound("stock record")),
            },
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM stock_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgMovementStore {
    pool: PgPool,
}

impl PgMovementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MovementStore for PgMovementStore {
    async fn append(&self, movement: StockMovement) -> Result<StockMovement> {
        Ok(sqlx::query_as::<_, StockMovement>(
            "INSERT INTO stock_movements \
             (id, inventory_id, movement_type, quantity, reference_id, reference_type, notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING *",
        )
        .bind(movement.id)
        .bind(movement.inventory_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.reference_id)
        .bind(&movement.reference_type)
        .bind(&movement.notes)
        .bind(movement.created_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_by_inventory(&self, inventory_id: Uuid) -> Result<Vec<StockMovement>> {
        Ok(sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements WHERE inventory_id = $1 ORDER BY created_at DESC",
        )
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn enqueue(&self, intent: SyncIntent) -> Result<SyncIntent> {
        Ok(sqlx::query_as::<_, SyncIntent>(
            "INSERT INTO sync_outbox (id, product_id, attempts, last_error, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(intent.id)
        .bind(intent.product_id)
        .bind(intent.attempts)
        .bind(&intent.last_error)
        .bind(intent.created_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn pending(&self) -> Result<Vec<SyncIntent>> {
        Ok(
            sqlx::query_as::<_, SyncIntent>("SELECT * FROM sync_outbox ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn mark_done(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM sync_outbox WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE sync_outbox SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Row shape for the products table; `size_inventory` is stored as JSONB.
#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    manage_stock: bool,
    allow_backorders: bool,
    available_sizes: Vec<String>,
    size_inventory: Json<Vec<SizeQuantity>>,
    stock_quantity: i32,
    in_stock: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            manage_stock: row.manage_stock,
            allow_backorders: row.allow_backorders,
            available_sizes: row.available_sizes,
            size_inventory: row.size_inventory.0,
            stock_quantity: row.stock_quantity,
            in_stock: row.in_stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PgCatalog {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn list_variations(&self, product_id: Uuid) -> Result<Vec<ProductVariation>> {
        Ok(sqlx::query_as::<_, ProductVariation>(
            "SELECT * FROM product_variations WHERE product_id = $1 ORDER BY id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_variation_stock(
        &self,
        variation_id: Uuid,
        stock_quantity: i32,
        status: VariationStockStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE product_variations \
             SET stock_quantity = $2, stock_status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(variation_id)
        .bind(stock_quantity)
        .bind(status)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(InventoryError::NotFound("product variation"));
        }
        Ok(())
    }

    async fn set_product_stock(
        &self,
        product_id: Uuid,
        stock_quantity: i32,
        in_stock: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products \
             SET stock_quantity = $2, in_stock = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(product_id)
        .bind(stock_quantity)
        .bind(in_stock)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(InventoryError::NotFound("product"));
        }
        Ok(())
    }
}
