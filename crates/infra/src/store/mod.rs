//! Persistence boundary for stock, ledger, orders and deliveries.
//!
//! Components never touch storage directly: they describe a unit of work as a
//! closure over [`StoreTx`] and hand it to [`StockStore::transaction`]. The
//! store commits when the closure returns `Ok` and discards every write made
//! inside it otherwise, so a catalog change and its ledger entry are always
//! visible together or not at all.

pub mod in_memory;

pub use in_memory::InMemoryStore;

use std::sync::Arc;

use thiserror::Error;

use stockline_core::{DeliveryId, DriverId, ItemId, MovementId, OrderId};
use stockline_inventory::{CatalogKind, Direction, ItemRef, NewMovement, StockItem, StockMovement};
use stockline_sales::{Delivery, Driver, Order};

/// Persistence failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not serve the request (timeout, outage). Retryable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write would break a store-level constraint (e.g. unique name index).
    #[error("store conflict: {0}")]
    Conflict(String),
}

/// Ledger query filter; `None` fields match everything.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub kind: Option<CatalogKind>,
    pub item_id: Option<ItemId>,
    pub direction: Option<Direction>,
}

impl MovementFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn item(item: ItemRef) -> Self {
        Self {
            kind: Some(item.kind),
            item_id: Some(item.id),
            direction: None,
        }
    }

    pub fn matches(&self, movement: &StockMovement) -> bool {
        self.kind.is_none_or(|k| movement.item.kind == k)
            && self.item_id.is_none_or(|id| movement.item.id == id)
            && self.direction.is_none_or(|d| movement.direction == d)
    }
}

/// Read access to committed (or in-transaction) state.
pub trait StoreRead {
    fn item(&self, item: ItemRef) -> Result<Option<StockItem>, StoreError>;

    /// Lookup by the normalized name key (see `stockline_inventory::normalize_name`).
    fn item_by_name(&self, kind: CatalogKind, name_key: &str)
    -> Result<Option<StockItem>, StoreError>;

    /// All items of a kind, ascending id.
    fn items(&self, kind: CatalogKind) -> Result<Vec<StockItem>, StoreError>;

    fn movement(&self, id: MovementId) -> Result<Option<StockMovement>, StoreError>;

    /// Matching movements in insertion order (ascending sequence).
    fn movements(&self, filter: &MovementFilter) -> Result<Vec<StockMovement>, StoreError>;

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Orders in creation order.
    fn orders(&self) -> Result<Vec<Order>, StoreError>;

    fn delivery(&self, id: DeliveryId) -> Result<Option<Delivery>, StoreError>;

    /// Deliveries in creation order.
    fn deliveries(&self) -> Result<Vec<Delivery>, StoreError>;

    fn driver(&self, id: DriverId) -> Result<Option<Driver>, StoreError>;

    /// Drivers in roster (creation) order.
    fn drivers(&self) -> Result<Vec<Driver>, StoreError>;
}

/// Writes available inside a unit of work.
pub trait StoreTx: StoreRead {
    /// Next id from the kind's sequence. Sequences are never rolled back.
    fn next_item_id(&mut self, kind: CatalogKind) -> Result<ItemId, StoreError>;

    /// Insert or replace; fails with `Conflict` if another item of the kind owns the name.
    fn put_item(&mut self, item: StockItem) -> Result<(), StoreError>;

    fn remove_item(&mut self, item: ItemRef) -> Result<Option<StockItem>, StoreError>;

    /// Append-only: assigns id, sequence and the store timestamp.
    fn append_movement(&mut self, movement: NewMovement) -> Result<StockMovement, StoreError>;

    fn remove_movement(&mut self, id: MovementId) -> Result<Option<StockMovement>, StoreError>;

    fn put_order(&mut self, order: Order) -> Result<(), StoreError>;

    fn remove_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    fn put_delivery(&mut self, delivery: Delivery) -> Result<(), StoreError>;

    fn remove_delivery(&mut self, id: DeliveryId) -> Result<Option<Delivery>, StoreError>;

    fn put_driver(&mut self, driver: Driver) -> Result<(), StoreError>;

    fn remove_driver(&mut self, id: DriverId) -> Result<Option<Driver>, StoreError>;
}

/// Durable store with all-or-nothing units of work.
///
/// Implementations must:
/// - make every write inside `transaction` visible atomically on `Ok`
/// - discard every write inside `transaction` on `Err` (or panic)
/// - serialize units of work touching the same records (no lost updates,
///   no check-then-act races between concurrent transactions)
pub trait StockStore: Send + Sync {
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, E>,
        E: From<StoreError>;

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).read(f)
    }

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).transaction(f)
    }
}
