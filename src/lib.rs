//! Stockroom
//!
//! Inventory and stock synchronization service for e-commerce
//! storefronts.
//!
//! ## Features
//! - Per-warehouse, per-variation, per-size stock ledger
//! - Append-only movement audit trail
//! - Cross-warehouse transfers with rollback on partial failure
//! - Bidirectional product/inventory denormalization with a durable
//!   sync outbox
//! - Low-stock and out-of-stock reporting

pub mod domain;
pub mod error;
pub mod http;
pub mod service;
pub mod store;

pub use error::{InventoryError, Result};
