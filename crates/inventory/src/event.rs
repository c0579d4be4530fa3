use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_events::Event;

use crate::item::{StockItem, StockStatus};
use crate::kind::ItemRef;
use crate::movement::StockMovement;

/// Event: an item dropped to or below its reorder level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderLevelReached {
    pub item: ItemRef,
    pub name: String,
    pub quantity: i64,
    pub reorder_level: i64,
    pub status: StockStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Facts published after an inventory unit of work commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    MovementRecorded(StockMovement),
    ReorderLevelReached(ReorderLevelReached),
}

impl StockEvent {
    /// `ReorderLevelReached` when a change crosses from above the reorder level to at or below it.
    pub fn reorder_crossing(
        before: Option<&StockItem>,
        after: &StockItem,
        occurred_at: DateTime<Utc>,
    ) -> Option<Self> {
        let was_low = before.is_some_and(StockItem::is_low_stock);
        if was_low || !after.is_low_stock() {
            return None;
        }
        Some(StockEvent::ReorderLevelReached(ReorderLevelReached {
            item: after.item_ref(),
            name: after.name().to_string(),
            quantity: after.quantity(),
            reorder_level: after.reorder_level(),
            status: after.status(),
            occurred_at,
        }))
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::MovementRecorded(_) => "inventory.movement.recorded",
            StockEvent::ReorderLevelReached(_) => "inventory.item.reorder_level_reached",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::MovementRecorded(m) => m.recorded_at,
            StockEvent::ReorderLevelReached(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{NewStockItem, StockItemPatch, StorageLocation};
    use crate::kind::CatalogKind;
    use stockline_core::ItemId;

    fn jute(quantity: i64) -> StockItem {
        StockItem::create(
            CatalogKind::PackingMaterial,
            ItemId::new(1),
            NewStockItem {
                name: "Jute Bag".to_string(),
                quantity,
                unit: "pcs".to_string(),
                reorder_level: 20,
                unit_price: 40,
                location: StorageLocation::WarehouseB,
                received_date: None,
                expiry_date: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn crossing_into_low_emits_once() {
        let now = Utc::now();
        let item = jute(100);
        let low = item.apply_patch(&StockItemPatch::quantity(15), now).unwrap();
        let lower = low.apply_patch(&StockItemPatch::quantity(5), now).unwrap();

        let event = StockEvent::reorder_crossing(Some(&item), &low, now).unwrap();
        assert_eq!(event.event_type(), "inventory.item.reorder_level_reached");
        match event {
            StockEvent::ReorderLevelReached(e) => {
                assert_eq!(e.quantity, 15);
                assert_eq!(e.status, StockStatus::Low);
            }
            other => panic!("unexpected event {other:?}"),
        }

        // Already low: no repeat.
        assert!(StockEvent::reorder_crossing(Some(&low), &lower, now).is_none());
        // Still above the level: nothing.
        assert!(StockEvent::reorder_crossing(None, &item, now).is_none());
    }

    #[test]
    fn an_item_created_at_or_below_its_level_is_reported() {
        let item = jute(10);
        assert!(StockEvent::reorder_crossing(None, &item, Utc::now()).is_some());
    }
}
