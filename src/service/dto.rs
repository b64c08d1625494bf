//! Request bodies for the inventory endpoints, validated at the HTTP
//! boundary.

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::stock::{MovementType, StockStatus};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInventoryDto {
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    #[validate(length(min = 1, max = 20))]
    pub size: Option<String>,
    #[validate(range(min = 0))]
    pub current_stock: i32,
    #[validate(range(min = 0))]
    pub reserved_stock: Option<i32>,
    #[validate(range(min = 0))]
    pub reorder_point: i32,
    #[validate(range(min = 0))]
    pub reorder_quantity: i32,
    #[validate(range(min = 0))]
    pub max_stock: Option<i32>,
    #[validate(length(min = 1, max = 64))]
    pub warehouse_id: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateInventoryDto {
    #[validate(range(min = 0))]
    pub current_stock: Option<i32>,
    #[validate(range(min = 0))]
    pub reserved_stock: Option<i32>,
    #[validate(range(min = 0))]
    pub reorder_point: Option<i32>,
    #[validate(range(min = 0))]
    pub reorder_quantity: Option<i32>,
    #[validate(range(min = 0))]
    pub max_stock: Option<i32>,
    pub status: Option<StockStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockDto {
    /// Signed delta applied to `current_stock`.
    pub quantity: i32,
    pub movement_type: MovementType,
    pub reference_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub reference_type: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferStockDto {
    #[validate(length(min = 1, max = 64))]
    pub to_warehouse: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReserveStockDto {
    #[validate(range(min = 0))]
    pub reserved_stock: i32,
}
