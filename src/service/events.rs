//! Movement event publishing over NATS.
//!
//! Best-effort: a stock write is never rolled back or failed because the
//! event could not be published.

use tracing::warn;

use crate::domain::stock::StockMovement;

pub const MOVEMENTS_SUBJECT: &str = "inventory.movements";

#[derive(Clone, Default)]
pub struct MovementEvents {
    client: Option<async_nats::Client>,
}

impl MovementEvents {
    pub fn new(client: Option<async_nats::Client>) -> Self {
        Self { client }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub async fn publish(&self, movement: &StockMovement) {
        let Some(client) = &self.client else {
            return;
        };
        let payload = match serde_json::to_vec(movement) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to encode movement event");
                return;
            }
        };
        if let Err(e) = client
            .publish(MOVEMENTS_SUBJECT.to_string(), payload.into())
            .await
        {
            warn!(error = %e, "failed to publish movement event");
        }
    }
}
