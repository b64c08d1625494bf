//! Stock Ledger entities: records, movements, and status derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical stock status. The legacy per-variation enum on the product
/// side translates to and from this one at the boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "stock_status", rename_all = "snake_case")]
pub enum StockStatus {
    #[default]
    InStock,
    LowStock,
    OutOfStock,
    Discontinued,
}

/// Derive the stock status from a quantity and its reorder point.
///
/// `Discontinued` is administrative and never produced here; callers
/// holding a discontinued record keep it as-is (see
/// [`StockRecord::refresh_status`]).
pub fn derive_status(current: i32, reorder_point: i32, allow_backorders: bool) -> StockStatus {
    if current <= 0 {
        if allow_backorders {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        }
    } else if current <= reorder_point {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// Unique line key for a stock record: one record per
/// (product, variation, warehouse, size) combination.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StockKey {
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub warehouse_id: String,
    pub size: Option<String>,
}

impl StockKey {
    /// Same line at a different warehouse (transfer destination lookup).
    pub fn at_warehouse(&self, warehouse_id: impl Into<String>) -> Self {
        Self {
            warehouse_id: warehouse_id.into(),
            ..self.clone()
        }
    }
}

/// Quantity on hand for one product/variation/size at one warehouse.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub size: Option<String>,
    pub warehouse_id: String,
    pub current_stock: i32,
    pub reserved_stock: i32,
    pub reorder_point: i32,
    pub reorder_quantity: i32,
    pub max_stock: Option<i32>,
    pub status: StockStatus,
    pub last_restocked: Option<DateTime<Utc>>,
    pub last_sold: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter; every store write compares and bumps it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    pub fn key(&self) -> StockKey {
        StockKey {
            product_id: self.product_id,
            variation_id: self.variation_id,
            warehouse_id: self.warehouse_id.clone(),
            size: self.size.clone(),
        }
    }

    /// Stock available for new allocation. Can go negative: reservation is
    /// a direct set and is not checked against `current_stock`.
    pub fn available_stock(&self) -> i32 {
        self.current_stock - self.reserved_stock
    }

    pub fn is_low(&self) -> bool {
        self.current_stock <= self.reorder_point
    }

    /// Recompute status from the current quantity. Discontinued is sticky.
    pub fn refresh_status(&mut self, allow_backorders: bool) {
        if self.status != StockStatus::Discontinued {
            self.status = derive_status(self.current_stock, self.reorder_point, allow_backorders);
        }
    }
}

/// Direction of a stock movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "movement_type", rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
}

/// Reference-type markers for transfer movements.
pub const REF_TRANSFER_IN: &str = "TRANSFER_IN";
pub const REF_TRANSFER_OUT: &str = "TRANSFER_OUT";

/// Immutable audit entry for one stock quantity change.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub movement_type: MovementType,
    /// Signed delta as applied to the record.
    pub quantity: i32,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counts over the whole ledger.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StockStats {
    pub total: i64,
    pub low_stock: i64,
    pub out_of_stock: i64,
    pub in_stock: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_status_out_of_stock() {
        assert_eq!(derive_status(0, 0, false), StockStatus::OutOfStock);
        assert_eq!(derive_status(0, 10, false), StockStatus::OutOfStock);
    }

    #[test]
    fn test_derive_status_backorder_counts_as_in_stock() {
        assert_eq!(derive_status(0, 10, true), StockStatus::InStock);
    }

    #[test]
    fn test_derive_status_low_stock() {
        assert_eq!(derive_status(5, 10, false), StockStatus::LowStock);
        assert_eq!(derive_status(10, 10, false), StockStatus::LowStock);
    }

    #[test]
    fn test_derive_status_in_stock() {
        assert_eq!(derive_status(50, 10, false), StockStatus::InStock);
        assert_eq!(derive_status(11, 10, false), StockStatus::InStock);
    }

    #[test]
    fn test_derive_status_is_pure() {
        for _ in 0..3 {
            assert_eq!(derive_status(5, 10, false), StockStatus::LowStock);
        }
    }

    #[test]
    fn test_discontinued_is_sticky() {
        let mut record = StockRecord {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variation_id: None,
            size: None,
            warehouse_id: "main".into(),
            current_stock: 100,
            reserved_stock: 0,
            reorder_point: 5,
            reorder_quantity: 20,
            max_stock: None,
            status: StockStatus::Discontinued,
            last_restocked: None,
            last_sold: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        record.refresh_status(false);
        assert_eq!(record.status, StockStatus::Discontinued);
    }

    #[test]
    fn test_available_stock_can_go_negative() {
        let record = StockRecord {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variation_id: None,
            size: None,
            warehouse_id: "main".into(),
            current_stock: 2,
            reserved_stock: 5,
            reorder_point: 5,
            reorder_quantity: 20,
            max_stock: None,
            status: StockStatus::LowStock,
            last_restocked: None,
            last_sold: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(record.available_stock(), -3);
    }
}
