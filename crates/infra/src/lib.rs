//! Infrastructure layer: persistence boundary, stock components, wiring.
//!
//! Domain crates decide; this crate runs those decisions inside store units
//! of work and reports failures as [`ServiceError`].

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod fulfillment;
pub mod ledger;
pub mod roster;
pub mod services;
pub mod store;


pub use catalog::StockCatalog;
pub use config::InfraConfig;
pub use coordinator::{InventoryMutationCoordinator, Mutation};
pub use dispatch::DeliveryDispatcher;
pub use error::{ServiceError, ServiceResult};
pub use fulfillment::OrderFulfillmentEngine;
pub use ledger::MovementLedger;
pub use roster::DriverRoster;
pub use services::{InMemoryServices, InventoryServices};
pub use store::{InMemoryStore, MovementFilter, StockStore, StoreError, StoreRead, StoreTx};
