//! Domain event contracts and pub/sub mechanics.
//!
//! Stores are the source of truth; the bus only distributes facts that have
//! already been committed.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
