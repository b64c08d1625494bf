//! Domain entities for the stock ledger and its product-facing boundary.

pub mod product;
pub mod stock;
pub mod sync;
