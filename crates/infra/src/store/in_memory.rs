use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::time::{Duration, Instant};

use chrono::Utc;

use stockline_core::{DeliveryId, DriverId, Entity, ItemId, MovementId, OrderId};
use stockline_inventory::{CatalogKind, ItemRef, NewMovement, StockItem, StockMovement};
use stockline_sales::{Delivery, Driver, Order};

use super::{MovementFilter, StockStore, StoreError, StoreRead, StoreTx};
use crate::config::DEFAULT_LOCK_TIMEOUT;

const LOCK_RETRY_INTERVAL: Duration = Duration::from_micros(200);

/// Rows in insertion order with an id index.
#[derive(Debug)]
struct Table<V: Entity> {
    rows: BTreeMap<u64, V>,
    index: HashMap<V::Id, u64>,
    last_seq: u64,
}

impl<V: Entity> Default for Table<V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            index: HashMap::new(),
            last_seq: 0,
        }
    }
}

impl<V: Entity + Clone> Table<V> {
    fn get(&self, id: &V::Id) -> Option<&V> {
        self.index.get(id).and_then(|seq| self.rows.get(seq))
    }

    fn values(&self) -> impl Iterator<Item = &V> {
        self.rows.values()
    }

    /// Sequence the next new row will get.
    fn peek_seq(&self) -> u64 {
        self.last_seq + 1
    }

    /// Insert, or replace in place keeping the row's position. Returns the displaced row.
    fn put(&mut self, value: V) -> Option<(u64, V)> {
        let id = value.id().clone();
        match self.index.get(&id).copied() {
            Some(seq) => self.rows.insert(seq, value).map(|prev| (seq, prev)),
            None => {
                self.last_seq += 1;
                self.index.insert(id, self.last_seq);
                self.rows.insert(self.last_seq, value);
                None
            }
        }
    }

    fn remove(&mut self, id: &V::Id) -> Option<(u64, V)> {
        let seq = self.index.remove(id)?;
        self.rows.remove(&seq).map(|value| (seq, value))
    }

    /// Undo a `put`/`remove`: drop the current row and reinstate what it displaced.
    fn restore(&mut self, id: &V::Id, prev: Option<(u64, V)>) {
        self.remove(id);
        if let Some((seq, value)) = prev {
            self.index.insert(id.clone(), seq);
            self.rows.insert(seq, value);
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    items: Table<StockItem>,
    names: HashMap<(CatalogKind, String), ItemId>,
    movements: Table<StockMovement>,
    orders: Table<Order>,
    deliveries: Table<Delivery>,
    drivers: Table<Driver>,
    sequences: HashMap<CatalogKind, u64>,
}

impl Tables {
    fn put_item(&mut self, item: StockItem) -> Result<Option<(u64, StockItem)>, StoreError> {
        let kind = item.kind();
        let key = item.name_key();
        if let Some(owner) = self.names.get(&(kind, key.clone())) {
            if *owner != item.id_typed() {
                return Err(StoreError::Conflict(format!(
                    "{kind} name '{}' is owned by #{owner}",
                    item.name()
                )));
            }
        }

        let id = item.id_typed();
        let prev = self.items.put(item);
        if let Some((_, old)) = &prev {
            self.names.remove(&(kind, old.name_key()));
        }
        self.names.insert((kind, key), id);
        Ok(prev)
    }

    fn remove_item(&mut self, item: ItemRef) -> Option<(u64, StockItem)> {
        let removed = self.items.remove(&item)?;
        self.names.remove(&(item.kind, removed.1.name_key()));
        Some(removed)
    }

    fn restore_item(&mut self, item: ItemRef, prev: Option<(u64, StockItem)>) {
        self.remove_item(item);
        if let Some((seq, old)) = prev {
            self.names.insert((item.kind, old.name_key()), item.id);
            self.items.restore(&item, Some((seq, old)));
        }
    }
}

impl StoreRead for Tables {
    fn item(&self, item: ItemRef) -> Result<Option<StockItem>, StoreError> {
        Ok(self.items.get(&item).cloned())
    }

    fn item_by_name(
        &self,
        kind: CatalogKind,
        name_key: &str,
    ) -> Result<Option<StockItem>, StoreError> {
        Ok(self
            .names
            .get(&(kind, name_key.to_string()))
            .and_then(|id| self.items.get(&ItemRef::new(kind, *id)))
            .cloned())
    }

    fn items(&self, kind: CatalogKind) -> Result<Vec<StockItem>, StoreError> {
        let mut items: Vec<StockItem> = self
            .items
            .values()
            .filter(|i| i.kind() == kind)
            .cloned()
            .collect();
        items.sort_by_key(StockItem::id_typed);
        Ok(items)
    }

    fn movement(&self, id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        Ok(self.movements.get(&id).cloned())
    }

    fn movements(&self, filter: &MovementFilter) -> Result<Vec<StockMovement>, StoreError> {
        Ok(self
            .movements
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.get(&id).cloned())
    }

    fn orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.orders.values().cloned().collect())
    }

    fn delivery(&self, id: DeliveryId) -> Result<Option<Delivery>, StoreError> {
        Ok(self.deliveries.get(&id).cloned())
    }

    fn deliveries(&self) -> Result<Vec<Delivery>, StoreError> {
        Ok(self.deliveries.values().cloned().collect())
    }

    fn driver(&self, id: DriverId) -> Result<Option<Driver>, StoreError> {
        Ok(self.drivers.get(&id).cloned())
    }

    fn drivers(&self) -> Result<Vec<Driver>, StoreError> {
        Ok(self.drivers.values().cloned().collect())
    }
}

/// What a write displaced, so it can be put back.
#[derive(Debug)]
enum Undo {
    Item(ItemRef, Option<(u64, StockItem)>),
    Movement(MovementId, Option<(u64, StockMovement)>),
    Order(OrderId, Option<(u64, Order)>),
    Delivery(DeliveryId, Option<(u64, Delivery)>),
    Driver(DriverId, Option<(u64, Driver)>),
}

/// In-memory store for tests/dev.
///
/// All tables sit behind one `RwLock`; a unit of work holds the write lock
/// from its first read to its commit, so units of work are serializable.
/// Writes keep an undo log that is replayed in reverse when the unit of work
/// fails or panics. Not optimized for performance.
#[derive(Debug)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    faults: Mutex<Option<usize>>,
    lock_timeout: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Units of work waiting longer than `lock_timeout` fail with `Unavailable`.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            faults: Mutex::new(None),
            lock_timeout,
        }
    }

    /// Simulate an outage: allow `writes` more writes, then fail every write
    /// with `Unavailable` until [`clear_faults`](Self::clear_faults).
    pub fn fail_writes_after(&self, writes: usize) {
        if let Ok(mut budget) = self.faults.lock() {
            *budget = Some(writes);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut budget) = self.faults.lock() {
            *budget = None;
        }
    }

    fn timed_out(&self) -> StoreError {
        StoreError::Unavailable(format!(
            "timed out after {:?} waiting for the store lock",
            self.lock_timeout
        ))
    }

    fn write_tables(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match self.tables.try_write() {
                Ok(guard) => return Ok(guard),
                // A panicking unit of work rolls itself back before its guard drops.
                Err(TryLockError::Poisoned(poisoned)) => {
                    self.tables.clear_poison();
                    return Ok(poisoned.into_inner());
                }
                Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                    return Err(self.timed_out());
                }
                Err(TryLockError::WouldBlock) => std::thread::sleep(LOCK_RETRY_INTERVAL),
            }
        }
    }

    fn read_tables(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match self.tables.try_read() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                    return Err(self.timed_out());
                }
                Err(TryLockError::WouldBlock) => std::thread::sleep(LOCK_RETRY_INTERVAL),
            }
        }
    }
}

impl StockStore for InMemoryStore {
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, E>,
        E: From<StoreError>,
    {
        let tables = self.read_tables()?;
        f(&*tables)
    }

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut tables = self.write_tables()?;
        let mut tx = InMemoryTx {
            tables: &mut *tables,
            undo: Vec::new(),
            faults: &self.faults,
            committed: false,
        };

        let result = f(&mut tx);
        if result.is_ok() {
            tx.committed = true;
        }
        result
    }
}

struct InMemoryTx<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
    faults: &'a Mutex<Option<usize>>,
    committed: bool,
}

impl InMemoryTx<'_> {
    fn charge(&self) -> Result<(), StoreError> {
        let mut budget = self
            .faults
            .lock()
            .map_err(|_| StoreError::Unavailable("fault injector poisoned".to_string()))?;
        match *budget {
            Some(0) => Err(StoreError::Unavailable("injected write failure".to_string())),
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn rollback(&mut self) {
        while let Some(op) = self.undo.pop() {
            match op {
                Undo::Item(item, prev) => self.tables.restore_item(item, prev),
                Undo::Movement(id, prev) => self.tables.movements.restore(&id, prev),
                Undo::Order(id, prev) => self.tables.orders.restore(&id, prev),
                Undo::Delivery(id, prev) => self.tables.deliveries.restore(&id, prev),
                Undo::Driver(id, prev) => self.tables.drivers.restore(&id, prev),
            }
        }
    }
}

impl Drop for InMemoryTx<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

impl StoreRead for InMemoryTx<'_> {
    fn item(&self, item: ItemRef) -> Result<Option<StockItem>, StoreError> {
        self.tables.item(item)
    }

    fn item_by_name(
        &self,
        kind: CatalogKind,
        name_key: &str,
    ) -> Result<Option<StockItem>, StoreError> {
        self.tables.item_by_name(kind, name_key)
    }

    fn items(&self, kind: CatalogKind) -> Result<Vec<StockItem>, StoreError> {
        self.tables.items(kind)
    }

    fn movement(&self, id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        self.tables.movement(id)
    }

    fn movements(&self, filter: &MovementFilter) -> Result<Vec<StockMovement>, StoreError> {
        self.tables.movements(filter)
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.tables.order(id)
    }

    fn orders(&self) -> Result<Vec<Order>, StoreError> {
        self.tables.orders()
    }

    fn delivery(&self, id: DeliveryId) -> Result<Option<Delivery>, StoreError> {
        self.tables.delivery(id)
    }

    fn deliveries(&self) -> Result<Vec<Delivery>, StoreError> {
        self.tables.deliveries()
    }

    fn driver(&self, id: DriverId) -> Result<Option<Driver>, StoreError> {
        self.tables.driver(id)
    }

    fn drivers(&self) -> Result<Vec<Driver>, StoreError> {
        self.tables.drivers()
    }
}

impl StoreTx for InMemoryTx<'_> {
    fn next_item_id(&mut self, kind: CatalogKind) -> Result<ItemId, StoreError> {
        let last = self.tables.sequences.entry(kind).or_insert(0);
        *last += 1;
        Ok(ItemId::new(*last))
    }

    fn put_item(&mut self, item: StockItem) -> Result<(), StoreError> {
        self.charge()?;
        let key = item.item_ref();
        let prev = self.tables.put_item(item)?;
        self.undo.push(Undo::Item(key, prev));
        Ok(())
    }

    fn remove_item(&mut self, item: ItemRef) -> Result<Option<StockItem>, StoreError> {
        self.charge()?;
        let removed = self.tables.remove_item(item);
        let value = removed.as_ref().map(|(_, v)| v.clone());
        if removed.is_some() {
            self.undo.push(Undo::Item(item, removed));
        }
        Ok(value)
    }

    fn append_movement(&mut self, movement: NewMovement) -> Result<StockMovement, StoreError> {
        self.charge()?;
        let committed = movement.commit(self.tables.movements.peek_seq(), Utc::now());
        self.tables.movements.put(committed.clone());
        self.undo.push(Undo::Movement(committed.id, None));
        Ok(committed)
    }

    fn remove_movement(&mut self, id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        self.charge()?;
        let removed = self.tables.movements.remove(&id);
        let value = removed.as_ref().map(|(_, v)| v.clone());
        if removed.is_some() {
            self.undo.push(Undo::Movement(id, removed));
        }
        Ok(value)
    }

    fn put_order(&mut self, order: Order) -> Result<(), StoreError> {
        self.charge()?;
        let id = order.id_typed();
        let prev = self.tables.orders.put(order);
        self.undo.push(Undo::Order(id, prev));
        Ok(())
    }

    fn remove_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.charge()?;
        let removed = self.tables.orders.remove(&id);
        let value = removed.as_ref().map(|(_, v)| v.clone());
        if removed.is_some() {
            self.undo.push(Undo::Order(id, removed));
        }
        Ok(value)
    }

    fn put_delivery(&mut self, delivery: Delivery) -> Result<(), StoreError> {
        self.charge()?;
        let id = delivery.id_typed();
        let prev = self.tables.deliveries.put(delivery);
        self.undo.push(Undo::Delivery(id, prev));
        Ok(())
    }

    fn remove_delivery(&mut self, id: DeliveryId) -> Result<Option<Delivery>, StoreError> {
        self.charge()?;
        let removed = self.tables.deliveries.remove(&id);
        let value = removed.as_ref().map(|(_, v)| v.clone());
        if removed.is_some() {
            self.undo.push(Undo::Delivery(id, removed));
        }
        Ok(value)
    }

    fn put_driver(&mut self, driver: Driver) -> Result<(), StoreError> {
        self.charge()?;
        let id = driver.id_typed();
        let prev = self.tables.drivers.put(driver);
        self.undo.push(Undo::Driver(id, prev));
        Ok(())
    }

    fn remove_driver(&mut self, id: DriverId) -> Result<Option<Driver>, StoreError> {
        self.charge()?;
        let removed = self.tables.drivers.remove(&id);
        let value = removed.as_ref().map(|(_, v)| v.clone());
        if removed.is_some() {
            self.undo.push(Undo::Driver(id, removed));
        }
        Ok(value)
    }
}
