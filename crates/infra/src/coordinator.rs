//! Inventory mutation pipeline (catalog change + ledger entry as one unit of work).
//!
//! Every quantity-changing operation flows through [`InventoryMutationCoordinator::execute`]:
//!
//! ```text
//! closure(Mutation)
//!   ↓
//! 1. Open a store transaction (serialized against other units of work)
//!   ↓
//! 2. Read current item state, decide the new state (pure domain code)
//!   ↓
//! 3. Write the item, append the ledger entry explaining the change
//!   ↓
//! 4. Commit on Ok, roll back every write on Err
//!   ↓
//! 5. Publish the committed facts to the bus (best-effort)
//! ```
//!
//! ## Guarantees
//!
//! - An item write and its ledger entry are visible together or not at all.
//! - Each logical change produces exactly one item write and at most one
//!   movement (none for a no-op quantity update).
//! - Status is re-derived by the domain type before the write, inside the
//!   same transaction.
//! - Events describe committed state only. A failed publish is logged and
//!   never turns a committed change into an error.

use chrono::{DateTime, Utc};

use stockline_core::ItemId;
use stockline_events::{Event, EventBus};
use stockline_inventory::{
    CatalogKind, Direction, ItemRef, MovementReason, NewMovement, StockEvent, StockItem,
    StockMovement, normalize_name,
};
use stockline_sales::Order;

use crate::config::InfraConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::ledger;
use crate::store::{StockStore, StoreTx};

/// Handle on an open unit of work.
///
/// Item writes go through [`insert`](Self::insert), [`replace`](Self::replace)
/// and [`remove`](Self::remove), which append the matching ledger entry, so a
/// caller cannot change a quantity without recording it.
pub struct Mutation<'a> {
    tx: &'a mut dyn StoreTx,
    now: DateTime<Utc>,
    low_stock_events: bool,
    events: Vec<StockEvent>,
}

impl Mutation<'_> {
    /// Clock reading shared by every write in this unit of work.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn item(&self, item: ItemRef) -> ServiceResult<Option<StockItem>> {
        Ok(self.tx.item(item)?)
    }

    pub fn require_item(&self, item: ItemRef) -> ServiceResult<StockItem> {
        self.item(item)?
            .ok_or_else(|| ServiceError::not_found(item.kind.to_string(), item.id))
    }

    /// Lookup by name; `name` is normalized before matching.
    pub fn item_by_name(&self, kind: CatalogKind, name: &str) -> ServiceResult<Option<StockItem>> {
        Ok(self.tx.item_by_name(kind, &normalize_name(name))?)
    }

    pub fn next_item_id(&mut self, kind: CatalogKind) -> ServiceResult<ItemId> {
        Ok(self.tx.next_item_id(kind)?)
    }

    /// Store a new item; its initial quantity is recorded as received.
    ///
    /// Fails with `ConcurrencyConflict` if the id is already taken.
    pub fn insert(&mut self, item: StockItem) -> ServiceResult<StockItem> {
        if self.tx.item(item.item_ref())?.is_some() {
            return Err(ServiceError::ConcurrencyConflict(format!(
                "{} already exists",
                item.item_ref()
            )));
        }
        self.tx.put_item(item.clone())?;
        if item.quantity() > 0 {
            let movement = NewMovement::new(
                &item,
                Direction::In,
                item.quantity(),
                MovementReason::Received,
            )?;
            self.record(movement)?;
        }
        self.check_reorder_level(None, &item);
        Ok(item)
    }

    /// Store `after` in place of `before`, recording the quantity delta (if any).
    ///
    /// `before` must be the stored row: a snapshot whose version differs is
    /// rejected with `ConcurrencyConflict`.
    pub fn replace(
        &mut self,
        before: &StockItem,
        after: StockItem,
        reason: MovementReason,
    ) -> ServiceResult<StockItem> {
        if before.item_ref() != after.item_ref() {
            return Err(ServiceError::ConcurrencyConflict(format!(
                "cannot replace {} with {}",
                before.item_ref(),
                after.item_ref()
            )));
        }
        let stored = self.current(before)?;
        self.tx.put_item(after.clone())?;
        let delta = after.quantity() - stored.quantity();
        if let Some(movement) = NewMovement::for_delta(&after, delta, reason) {
            self.record(movement)?;
        }
        self.check_reorder_level(Some(&stored), &after);
        Ok(after)
    }

    /// Write off the remaining quantity, then drop the item.
    ///
    /// Same version rule as [`replace`](Self::replace).
    pub fn remove(&mut self, item: &StockItem) -> ServiceResult<()> {
        let item = &self.current(item)?;
        if item.quantity() > 0 {
            let movement = NewMovement::new(
                item,
                Direction::Out,
                item.quantity(),
                MovementReason::Removed,
            )?;
            self.record(movement)?;
        }
        self.tx
            .remove_item(item.item_ref())?
            .ok_or_else(|| ServiceError::not_found(item.kind().to_string(), item.id_typed()))?;
        Ok(())
    }

    /// Persist an order in the same unit of work as its reservations.
    pub fn put_order(&mut self, order: Order) -> ServiceResult<()> {
        Ok(self.tx.put_order(order)?)
    }

    /// The stored row behind `snapshot`, provided both are at the same version.
    fn current(&self, snapshot: &StockItem) -> ServiceResult<StockItem> {
        let stored = self.require_item(snapshot.item_ref())?;
        if stored.version() != snapshot.version() {
            return Err(ServiceError::ConcurrencyConflict(format!(
                "{} is at version {}, snapshot is at {}",
                stored.item_ref(),
                stored.version(),
                snapshot.version()
            )));
        }
        Ok(stored)
    }

    fn record(&mut self, movement: NewMovement) -> ServiceResult<StockMovement> {
        let committed = ledger::append(self.tx, movement)?;
        self.events
            .push(StockEvent::MovementRecorded(committed.clone()));
        Ok(committed)
    }

    fn check_reorder_level(&mut self, before: Option<&StockItem>, after: &StockItem) {
        if !self.low_stock_events {
            return;
        }
        if let Some(event) = StockEvent::reorder_crossing(before, after, self.now) {
            self.events.push(event);
        }
    }
}

/// Runs inventory units of work against a store and fans out the results.
///
/// ## Generic Parameters
///
/// - `S`: store implementation (`InMemoryStore` in tests, a database adapter later)
/// - `B`: bus receiving [`StockEvent`]s after commit
#[derive(Debug, Clone)]
pub struct InventoryMutationCoordinator<S, B> {
    store: S,
    bus: B,
    low_stock_events: bool,
}

impl<S, B> InventoryMutationCoordinator<S, B> {
    pub fn new(store: S, bus: B, config: &InfraConfig) -> Self {
        Self {
            store,
            bus,
            low_stock_events: config.low_stock_events,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, B> InventoryMutationCoordinator<S, B>
where
    S: StockStore,
    B: EventBus<StockEvent>,
{
    /// Run `f` as one atomic unit of work.
    ///
    /// Returns whatever `f` returns. On `Err` (or a panic inside `f`) nothing
    /// `f` wrote is kept and nothing is published.
    pub fn execute<T, F>(&self, f: F) -> ServiceResult<T>
    where
        F: FnOnce(&mut Mutation<'_>) -> ServiceResult<T>,
    {
        let low_stock_events = self.low_stock_events;
        let (value, events) = self.store.transaction(|tx| {
            let mut mutation = Mutation {
                tx,
                now: Utc::now(),
                low_stock_events,
                events: Vec::new(),
            };
            let value = f(&mut mutation)?;
            Ok::<_, ServiceError>((value, mutation.events))
        })?;

        self.publish(events);
        Ok(value)
    }

    fn publish(&self, events: Vec<StockEvent>) {
        for event in events {
            let event_type = event.event_type();
            if let Err(err) = self.bus.publish(event) {
                tracing::warn!(
                    event_type,
                    error = ?err,
                    "failed to publish stock event; the change is committed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stockline_events::InMemoryEventBus;
    use stockline_inventory::{NewStockItem, StockItemPatch, StorageLocation};

    use crate::store::{InMemoryStore, MovementFilter, StoreRead};

    type Coordinator =
        InventoryMutationCoordinator<Arc<InMemoryStore>, Arc<InMemoryEventBus<StockEvent>>>;

    fn coordinator() -> (Coordinator, Arc<InMemoryStore>, Arc<InMemoryEventBus<StockEvent>>) {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let c = InventoryMutationCoordinator::new(store.clone(), bus.clone(), &InfraConfig::default());
        (c, store, bus)
    }

    fn new_latex(quantity: i64) -> NewStockItem {
        NewStockItem {
            name: "Latex".to_string(),
            quantity,
            unit: "l".to_string(),
            reorder_level: 20,
            unit_price: 900,
            location: StorageLocation::ColdStore,
            received_date: None,
            expiry_date: None,
        }
    }

    fn insert_latex(c: &Coordinator, quantity: i64) -> StockItem {
        c.execute(|m| {
            let id = m.next_item_id(CatalogKind::RawMaterial)?;
            let item = StockItem::create(CatalogKind::RawMaterial, id, new_latex(quantity), m.now())?;
            m.insert(item)
        })
        .unwrap()
    }

    fn movements(store: &InMemoryStore) -> Vec<StockMovement> {
        store
            .read(|r: &dyn StoreRead| r.movements(&MovementFilter::all()))
            .unwrap()
    }

    #[test]
    fn insert_records_the_initial_quantity() {
        let (c, store, bus) = coordinator();
        let sub = bus.subscribe();

        let item = insert_latex(&c, 50);

        let ledger = movements(&store);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].direction, Direction::In);
        assert_eq!(ledger[0].quantity, 50);
        assert_eq!(ledger[0].reason, MovementReason::Received);
        assert_eq!(ledger[0].item, item.item_ref());

        let events = sub.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StockEvent::MovementRecorded(_)));
    }

    #[test]
    fn unchanged_quantity_records_nothing() {
        let (c, store, _bus) = coordinator();
        let item = insert_latex(&c, 50);

        c.execute(|m| {
            let before = m.require_item(item.item_ref())?;
            let patch = StockItemPatch {
                unit_price: Some(950),
                ..StockItemPatch::default()
            };
            let after = before.apply_patch(&patch, m.now())?;
            m.replace(&before, after, MovementReason::Adjusted)
        })
        .unwrap();

        assert_eq!(movements(&store).len(), 1);
    }

    #[test]
    fn error_inside_the_unit_of_work_discards_item_and_movement() {
        let (c, store, bus) = coordinator();
        let item = insert_latex(&c, 50);
        let sub = bus.subscribe();

        let err = c
            .execute(|m| {
                let before = m.require_item(item.item_ref())?;
                let after = before.apply_patch(&StockItemPatch::quantity(5), m.now())?;
                m.replace(&before, after, MovementReason::Adjusted)?;
                Err::<(), _>(ServiceError::ConcurrencyConflict("late abort".to_string()))
            })
            .unwrap_err();
        assert!(err.is_retryable());

        let current = store
            .read(|r: &dyn StoreRead| r.item(item.item_ref()))
            .unwrap()
            .unwrap();
        assert_eq!(current.quantity(), 50);
        assert_eq!(movements(&store).len(), 1);
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn dropping_to_the_reorder_level_publishes_once() {
        let (c, _store, bus) = coordinator();
        let item = insert_latex(&c, 50);
        let sub = bus.subscribe();

        for quantity in [15, 10] {
            c.execute(|m| {
                let before = m.require_item(item.item_ref())?;
                let after = before.apply_patch(&StockItemPatch::quantity(quantity), m.now())?;
                m.replace(&before, after, MovementReason::Adjusted)
            })
            .unwrap();
        }

        let crossings = sub
            .drain()
            .into_iter()
            .filter(|e| matches!(e, StockEvent::ReorderLevelReached(_)))
            .count();
        assert_eq!(crossings, 1);
    }

    #[test]
    fn low_stock_events_can_be_switched_off() {
        let store = Arc::new(InMemoryStore::new());
        let bus: Arc<InMemoryEventBus<StockEvent>> = Arc::new(InMemoryEventBus::new());
        let config = InfraConfig {
            low_stock_events: false,
            ..InfraConfig::default()
        };
        let c = InventoryMutationCoordinator::new(store, bus.clone(), &config);
        let sub = bus.subscribe();

        insert_latex(&c, 5);

        assert!(
            sub.drain()
                .iter()
                .all(|e| matches!(e, StockEvent::MovementRecorded(_)))
        );
    }

    #[test]
    fn stale_snapshot_is_rejected_and_the_ledger_still_balances() {
        let (c, store, _bus) = coordinator();
        let stale = insert_latex(&c, 50);

        c.execute(|m| {
            let before = m.require_item(stale.item_ref())?;
            let after = before.apply_patch(&StockItemPatch::quantity(30), m.now())?;
            m.replace(&before, after, MovementReason::Adjusted)
        })
        .unwrap();

        let err = c
            .execute(|m| {
                let after = stale.apply_patch(&StockItemPatch::quantity(40), m.now())?;
                m.replace(&stale, after, MovementReason::Adjusted)
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::ConcurrencyConflict(_)));

        let err = c.execute(|m| m.remove(&stale)).unwrap_err();
        assert!(matches!(err, ServiceError::ConcurrencyConflict(_)));

        let current = store
            .read(|r: &dyn StoreRead| r.item(stale.item_ref()))
            .unwrap()
            .unwrap();
        assert_eq!(current.quantity(), 30);
        assert_eq!(stockline_inventory::net_balance(&movements(&store)), 30);
    }

    #[test]
    fn insert_refuses_an_id_that_is_already_stored() {
        let (c, store, _bus) = coordinator();
        let existing = insert_latex(&c, 50);

        let err = c
            .execute(|m| {
                let again =
                    StockItem::create(CatalogKind::RawMaterial, existing.id_typed(), new_latex(50), m.now())?;
                m.insert(again)
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::ConcurrencyConflict(_)));
        assert_eq!(movements(&store).len(), 1);
    }

    #[test]
    fn remove_writes_off_the_remaining_quantity() {
        let (c, store, _bus) = coordinator();
        let item = insert_latex(&c, 50);

        c.execute(|m| {
            let current = m.require_item(item.item_ref())?;
            m.remove(&current)
        })
        .unwrap();

        let ledger = movements(&store);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[1].direction, Direction::Out);
        assert_eq!(ledger[1].quantity, 50);
        assert_eq!(ledger[1].reason, MovementReason::Removed);
        assert_eq!(ledger[1].item_name, "Latex");
    }
}
