//! Durable sync intents: the outbox for ledger-to-product denormalization.
//!
//! A failed product sync must never fail the stock write that triggered
//! it, but it must not be silently lost either. Each push enqueues an
//! intent; intents that fail to apply stay pending with their last error
//! until a later flush succeeds.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct SyncIntent {
    pub id: Uuid,
    pub product_id: Uuid,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SyncIntent {
    pub fn new(product_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}
