//! Wiring: every component over one shared store and bus.

use std::sync::Arc;

use stockline_events::{EventBus, InMemoryEventBus};
use stockline_inventory::StockEvent;

use crate::catalog::StockCatalog;
use crate::config::InfraConfig;
use crate::coordinator::InventoryMutationCoordinator;
use crate::dispatch::DeliveryDispatcher;
use crate::fulfillment::OrderFulfillmentEngine;
use crate::ledger::MovementLedger;
use crate::roster::DriverRoster;
use crate::store::{InMemoryStore, StockStore};

/// The operation surface a transport layer consumes.
#[derive(Debug, Clone)]
pub struct InventoryServices<S, B> {
    pub catalog: StockCatalog<S, B>,
    pub ledger: MovementLedger<S>,
    pub orders: OrderFulfillmentEngine<S, B>,
    pub deliveries: DeliveryDispatcher<S>,
    pub drivers: DriverRoster<S>,
    store: S,
    bus: B,
}

impl<S, B> InventoryServices<S, B>
where
    S: StockStore + Clone,
    B: EventBus<StockEvent> + Clone,
{
    pub fn new(store: S, bus: B, config: &InfraConfig) -> Self {
        let coordinator = InventoryMutationCoordinator::new(store.clone(), bus.clone(), config);
        Self {
            catalog: StockCatalog::new(coordinator.clone()),
            ledger: MovementLedger::new(store.clone()),
            orders: OrderFulfillmentEngine::new(coordinator),
            deliveries: DeliveryDispatcher::new(store.clone()),
            drivers: DriverRoster::new(store.clone()),
            store,
            bus,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

/// Services over the in-memory store and bus (tests, local runs).
pub type InMemoryServices =
    InventoryServices<Arc<InMemoryStore>, Arc<InMemoryEventBus<StockEvent>>>;

impl InMemoryServices {
    pub fn in_memory(config: &InfraConfig) -> Self {
        let store = Arc::new(InMemoryStore::with_lock_timeout(config.lock_timeout));
        let bus = Arc::new(InMemoryEventBus::new());
        Self::new(store, bus, config)
    }
}
