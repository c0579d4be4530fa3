use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, Entity, MovementId, OrderId};

use crate::item::StockItem;
use crate::kind::{CatalogKind, ItemRef};

/// Direction of a quantity change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl Direction {
    /// Direction of a non-zero signed delta.
    pub fn of_delta(delta: i64) -> Option<Self> {
        match delta.signum() {
            1 => Some(Direction::In),
            -1 => Some(Direction::Out),
            _ => None,
        }
    }
}

/// Why a movement was recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovementReason {
    /// Initial quantity when the item was catalogued.
    Received,
    /// Manual quantity correction through an update.
    Adjusted,
    /// Remaining quantity written off when the item was deleted.
    Removed,
    /// Stock taken by a customer order.
    OrderReserved { order_id: OrderId },
}

/// A movement ready to be appended (the ledger assigns id, sequence and timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub item: ItemRef,
    pub item_name: String,
    pub direction: Direction,
    pub quantity: i64,
    pub reason: MovementReason,
}

impl NewMovement {
    pub fn new(
        item: &StockItem,
        direction: Direction,
        quantity: i64,
        reason: MovementReason,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity", "movement quantity must be positive"));
        }
        Ok(Self {
            item: item.item_ref(),
            item_name: item.name().to_string(),
            direction,
            quantity,
            reason,
        })
    }

    /// Movement explaining a signed quantity change; `None` for a zero delta.
    pub fn for_delta(item: &StockItem, delta: i64, reason: MovementReason) -> Option<Self> {
        let direction = Direction::of_delta(delta)?;
        Some(Self {
            item: item.item_ref(),
            item_name: item.name().to_string(),
            direction,
            quantity: delta.abs(),
            reason,
        })
    }

    /// Stamp the movement as committed.
    pub fn commit(self, sequence: u64, recorded_at: DateTime<Utc>) -> StockMovement {
        StockMovement {
            id: MovementId::new(),
            sequence,
            item: self.item,
            item_name: self.item_name,
            direction: self.direction,
            quantity: self.quantity,
            reason: self.reason,
            recorded_at,
        }
    }
}

/// Immutable ledger entry.
///
/// `item_name` is a snapshot so the entry stays readable after the item is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    /// Store-assigned insertion position; newest entries have the highest value.
    pub sequence: u64,
    pub item: ItemRef,
    pub item_name: String,
    pub direction: Direction,
    pub quantity: i64,
    pub reason: MovementReason,
    pub recorded_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn kind(&self) -> CatalogKind {
        self.item.kind
    }

    /// Quantity with its sign: positive for IN, negative for OUT.
    pub fn signed_quantity(&self) -> i64 {
        match self.direction {
            Direction::In => self.quantity,
            Direction::Out => -self.quantity,
        }
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// ΣIN − ΣOUT over the given movements.
pub fn net_balance<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> i64 {
    movements.into_iter().map(StockMovement::signed_quantity).sum()
}
