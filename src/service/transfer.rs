//! Transfer Coordinator: move stock between warehouses as one logical
//! unit.
//!
//! Debit and credit are separate CAS writes; if the credit fails the
//! debit is compensated by re-crediting the source, so a transfer is
//! all-or-nothing. Movements are appended only after both sides landed,
//! and the insufficient-stock case produces no writes at all.

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use chrono::Utc;

use crate::domain::stock::{
    MovementType, StockMovement, StockRecord, REF_TRANSFER_IN, REF_TRANSFER_OUT,
};
use crate::error::{InventoryError, Result};
use crate::service::dto::TransferStockDto;
use crate::service::ledger::{InventoryService, MAX_CAS_RETRIES};

#[derive(Debug, Serialize)]
pub struct TransferOutcome {
    pub from: StockRecord,
    pub to: StockRecord,
}

impl InventoryService {
    pub async fn transfer_stock(
        &self,
        from_id: Uuid,
        dto: TransferStockDto,
    ) -> Result<TransferOutcome> {
        let source = self.get(from_id).await?;

        // Destination must pre-exist and match the source's full line key
        // (product, variation, size) at the target warehouse.
        let dest_key = source.key().at_warehouse(&dto.to_warehouse);
        let dest = self
            .stock
            .find_by_key(&dest_key)
            .await?
            .ok_or(InventoryError::NotFound("destination stock record"))?;

        if source.current_stock < dto.quantity {
            return Err(InventoryError::InsufficientStock {
                requested: dto.quantity,
                available: source.current_stock,
            });
        }

        let allow_backorders = self.allow_backorders(source.product_id).await;

        let debited = self
            .apply_delta(source.id, -dto.quantity, allow_backorders)
            .await?;

        let credited = match self.apply_delta(dest.id, dto.quantity, allow_backorders).await {
            Ok(credited) => credited,
            Err(e) => {
                // Put the debited quantity back so the failed transfer
                // leaves no stock in limbo.
                self.compensate(debited.id, dto.quantity, allow_backorders)
                    .await;
                return Err(e);
            }
        };

        let now = Utc::now();
        let out = self
            .movements
            .append(StockMovement {
                id: Uuid::new_v4(),
                inventory_id: debited.id,
                movement_type: MovementType::Out,
                quantity: -dto.quantity,
                reference_id: Some(credited.id),
                reference_type: Some(REF_TRANSFER_OUT.into()),
                notes: Some(transfer_note("to", &credited.warehouse_id, dto.notes.as_deref())),
                created_at: now,
            })
            .await?;
        let incoming = self
            .movements
            .append(StockMovement {
                id: Uuid::new_v4(),
                inventory_id: credited.id,
                movement_type: MovementType::In,
                quantity: dto.quantity,
                reference_id: Some(debited.id),
                reference_type: Some(REF_TRANSFER_IN.into()),
                notes: Some(transfer_note("from", &debited.warehouse_id, dto.notes.as_deref())),
                created_at: now,
            })
            .await?;
        self.events.publish(&out).await;
        self.events.publish(&incoming).await;

        info!(
            from = %debited.id,
            to = %credited.id,
            quantity = dto.quantity,
            warehouse = %dto.to_warehouse,
            "stock transferred"
        );

        self.bridge.push_to_product(debited.product_id).await;

        Ok(TransferOutcome {
            from: debited,
            to: credited,
        })
    }

    /// CAS read-modify-write of one record's quantity. Re-checks
    /// sufficiency on every reload since another writer may have drained
    /// the record between attempts.
    async fn apply_delta(
        &self,
        id: Uuid,
        delta: i32,
        allow_backorders: bool,
    ) -> Result<StockRecord> {
        let mut attempts = 0;
        loop {
            let mut record = self.get(id).await?;
            let expected = record.version;
            let new_stock = record.current_stock + delta;
            if new_stock < 0 {
                return Err(InventoryError::InsufficientStock {
                    requested: -delta,
                    available: record.current_stock,
                });
            }
            record.current_stock = new_stock;
            if delta > 0 {
                record.last_restocked = Some(Utc::now());
            }
            record.refresh_status(allow_backorders);
            match self.stock.update(&record, expected).await {
                Ok(updated) => return Ok(updated),
                Err(InventoryError::StaleVersion(_)) if attempts + 1 < MAX_CAS_RETRIES => {
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn compensate(&self, id: Uuid, quantity: i32, allow_backorders: bool) {
        if self.apply_delta(id, quantity, allow_backorders).await.is_err() {
            // Nothing left to do automatically; the movement log and the
            // record disagree until an operator reconciles them.
            error!(
                record_id = %id,
                quantity,
                "failed to roll back debit after transfer credit failure"
            );
        }
    }
}

fn transfer_note(direction: &str, warehouse_id: &str, notes: Option<&str>) -> String {
    match notes {
        Some(notes) => format!("transferred {direction} {warehouse_id}: {notes}"),
        None => format!("transferred {direction} {warehouse_id}"),
    }
}
