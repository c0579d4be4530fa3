//! Inventory domain module.
//!
//! Stock items for the three parallel catalogs (raw materials, packing
//! materials, finished goods), their derived stock status, and the immutable
//! movement records that explain every quantity change. Pure domain logic:
//! no IO, no storage, no clocks (callers pass `now`).

pub mod event;
pub mod item;
pub mod kind;
pub mod movement;

pub use event::{ReorderLevelReached, StockEvent};
pub use item::{
    NewStockItem, StockItem, StockItemPatch, StockStatus, StorageLocation, display_name,
    normalize_name,
};
pub use kind::{CatalogKind, ItemRef};
pub use movement::{Direction, MovementReason, NewMovement, StockMovement, net_balance};
