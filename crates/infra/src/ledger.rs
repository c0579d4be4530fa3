//! Append-only movement ledger.
//!
//! Entries are written only by the mutation coordinator, inside the same unit
//! of work as the item change they explain. Once written, an entry's
//! direction, quantity and item linkage never change; the only other write is
//! an administrative delete used to trim the audit trail.

use stockline_core::MovementId;
use stockline_inventory::{ItemRef, NewMovement, StockMovement, net_balance};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{MovementFilter, StockStore, StoreTx};

/// Append a movement inside an open unit of work.
pub(crate) fn append(tx: &mut dyn StoreTx, movement: NewMovement) -> ServiceResult<StockMovement> {
    if movement.quantity <= 0 {
        return Err(ServiceError::ValidationFailed {
            field: "quantity".to_string(),
            reason: "movement quantity must be positive".to_string(),
        });
    }
    Ok(tx.append_movement(movement)?)
}

/// Read side of the ledger plus the administrative trim.
#[derive(Debug, Clone)]
pub struct MovementLedger<S> {
    store: S,
}

impl<S> MovementLedger<S>
where
    S: StockStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, id: MovementId) -> ServiceResult<StockMovement> {
        self.store
            .read(|view| view.movement(id).map_err(ServiceError::from))?
            .ok_or_else(|| ServiceError::not_found("movement", id))
    }

    /// Every movement, newest first.
    pub fn list_all(&self) -> ServiceResult<Vec<StockMovement>> {
        self.list_filtered(&MovementFilter::all())
    }

    /// Movements of one item, newest first. Works after the item is deleted.
    pub fn list_by_item(&self, item: ItemRef) -> ServiceResult<Vec<StockMovement>> {
        self.list_filtered(&MovementFilter::item(item))
    }

    pub fn list_filtered(&self, filter: &MovementFilter) -> ServiceResult<Vec<StockMovement>> {
        let mut movements = self
            .store
            .read(|view| view.movements(filter).map_err(ServiceError::from))?;
        movements.reverse();
        tracing::debug!(?filter, count = movements.len(), "listed movements");
        Ok(movements)
    }

    /// ΣIN − ΣOUT over the item's recorded movements.
    pub fn net_balance(&self, item: ItemRef) -> ServiceResult<i64> {
        let movements = self
            .store
            .read(|view| view.movements(&MovementFilter::item(item)).map_err(ServiceError::from))?;
        Ok(net_balance(&movements))
    }

    /// Administrative audit trim. Item quantities are not touched, so the
    /// item's balance no longer adds up once one of its entries is gone.
    pub fn delete(&self, id: MovementId) -> ServiceResult<StockMovement> {
        let removed = self.store.transaction(|tx| {
            tx.remove_movement(id)?
                .ok_or_else(|| ServiceError::not_found("movement", id))
        })?;
        tracing::info!(
            movement_id = %id,
            item = %removed.item,
            "movement deleted from the ledger"
        );
        Ok(removed)
    }
}
