//! Order fulfilment domain module.
//!
//! Customer orders with snapshotted line items, deliveries derived from
//! orders, and the driver roster deliveries point at. Pure domain logic.

pub mod delivery;
pub mod driver;
pub mod order;

pub use delivery::{Delivery, DeliveryStatus, available_drivers};
pub use driver::{Driver, DriverPatch, NewDriver};
pub use order::{CustomerInfo, LineItemRequest, Order, OrderLine, OrderStatus, PlaceOrder};
