//! Product-side boundary types: the denormalized stock fields the Sync
//! Bridge keeps consistent with the ledger.
//!
//! The product catalog is an external module; only the stock-relevant
//! slice of its shape lives here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stock::StockStatus;

/// Legacy stock status carried on product variations. Kept for the
/// external product shape; everything internal uses [`StockStatus`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "variation_stock_status", rename_all = "lowercase")]
pub enum VariationStockStatus {
    #[default]
    #[serde(rename = "instock")]
    InStock,
    #[serde(rename = "outofstock")]
    OutOfStock,
    #[serde(rename = "onbackorder")]
    OnBackorder,
}

impl From<StockStatus> for VariationStockStatus {
    fn from(status: StockStatus) -> Self {
        match status {
            StockStatus::InStock | StockStatus::LowStock => Self::InStock,
            StockStatus::OutOfStock | StockStatus::Discontinued => Self::OutOfStock,
        }
    }
}

impl From<VariationStockStatus> for StockStatus {
    fn from(status: VariationStockStatus) -> Self {
        match status {
            VariationStockStatus::OutOfStock => Self::OutOfStock,
            // Backorderable stock is still sellable.
            VariationStockStatus::InStock | VariationStockStatus::OnBackorder => Self::InStock,
        }
    }
}

/// Per-size quantity as entered on the product form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeQuantity {
    pub size: String,
    pub quantity: i32,
}

/// Stock-relevant slice of a catalog product.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    /// When false the bridge leaves this product alone entirely.
    pub manage_stock: bool,
    pub allow_backorders: bool,
    pub available_sizes: Vec<String>,
    pub size_inventory: Vec<SizeQuantity>,
    /// Denormalized aggregate over the ledger; a cache, not the truth.
    pub stock_quantity: i32,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Desired stock lines for this product: one per size, or a single
    /// no-size line when the product is not size-managed. Sizes listed in
    /// `available_sizes` but missing from `size_inventory` get quantity 0.
    pub fn stock_lines(&self) -> Vec<SizeQuantity> {
        if self.available_sizes.is_empty() {
            return vec![SizeQuantity {
                size: String::new(),
                quantity: self.stock_quantity,
            }];
        }
        self.available_sizes
            .iter()
            .map(|size| SizeQuantity {
                size: size.clone(),
                quantity: self
                    .size_inventory
                    .iter()
                    .find(|line| &line.size == size)
                    .map(|line| line.quantity)
                    .unwrap_or(0),
            })
            .collect()
    }
}

/// Stock-relevant slice of a product variation.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductVariation {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub stock_status: VariationStockStatus,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_translation() {
        assert_eq!(
            VariationStockStatus::from(StockStatus::LowStock),
            VariationStockStatus::InStock
        );
        assert_eq!(
            VariationStockStatus::from(StockStatus::OutOfStock),
            VariationStockStatus::OutOfStock
        );
        assert_eq!(
            StockStatus::from(VariationStockStatus::OnBackorder),
            StockStatus::InStock
        );
    }

    #[test]
    fn test_stock_lines_without_sizes() {
        let product = sample_product(vec![], vec![], 7);
        let lines = product.stock_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 7);
        assert!(lines[0].size.is_empty());
    }

    #[test]
    fn test_stock_lines_fill_missing_sizes_with_zero() {
        let product = sample_product(
            vec!["S".into(), "M".into()],
            vec![SizeQuantity { size: "S".into(), quantity: 10 }],
            0,
        );
        let lines = product.stock_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], SizeQuantity { size: "S".into(), quantity: 10 });
        assert_eq!(lines[1], SizeQuantity { size: "M".into(), quantity: 0 });
    }

    fn sample_product(
        available_sizes: Vec<String>,
        size_inventory: Vec<SizeQuantity>,
        stock_quantity: i32,
    ) -> Product {
        Product {
            id: Uuid::new_v4(),
            sku: "SKU-1".into(),
            name: "Tee".into(),
            manage_stock: true,
            allow_backorders: false,
            available_sizes,
            size_inventory,
            stock_quantity,
            in_stock: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
