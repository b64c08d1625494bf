//! Service layer: ledger operations, the transfer coordinator, and the
//! product sync bridge.

pub mod dto;
pub mod events;
pub mod ledger;
pub mod sync;
pub mod transfer;

pub use ledger::InventoryService;
pub use sync::SyncBridge;
