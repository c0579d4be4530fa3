//! Order placement with all-or-nothing stock reservation.
//!
//! A whole cart is reserved inside one unit of work: every line is resolved
//! and checked in cart order before anything is written, then every product
//! is decremented (ascending item id), one OUT movement is appended per product and the
//! order is stored. Any failure along the way rolls all of it back, so a
//! rejected order leaves no movements, no order and no decremented stock.
//!
//! Units of work are serialized by the store, which makes the check and the
//! decrement linearizable against concurrent orders for the same products.

use std::collections::HashMap;

use stockline_core::{ItemId, OrderId};
use stockline_events::EventBus;
use stockline_inventory::{CatalogKind, MovementReason, StockEvent, StockItem};
use stockline_sales::{Order, OrderLine, OrderStatus, PlaceOrder};

use crate::coordinator::{InventoryMutationCoordinator, Mutation};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{StockStore, StoreTx};

/// Demand for one product after merging duplicate lines.
struct Demand {
    item: StockItem,
    requested: i64,
}

/// Resolve every line against the finished-goods catalog.
///
/// Lines naming the same product are merged into the first occurrence, so
/// the result keeps the cart's order. The first unknown name aborts the cart.
fn resolve_cart(m: &Mutation<'_>, req: &PlaceOrder) -> ServiceResult<Vec<Demand>> {
    let mut cart: Vec<Demand> = Vec::with_capacity(req.items.len());
    let mut slots: HashMap<ItemId, usize> = HashMap::new();
    for line in &req.items {
        let item = m
            .item_by_name(CatalogKind::FinalProduct, &line.name)?
            .ok_or_else(|| ServiceError::OutOfCatalog(line.name.trim().to_string()))?;

        let slot = *slots.entry(item.id_typed()).or_insert_with(|| {
            cart.push(Demand {
                item,
                requested: 0,
            });
            cart.len() - 1
        });
        let demand = &mut cart[slot];
        demand.requested = demand.requested.checked_add(line.quantity).ok_or_else(|| {
            ServiceError::ValidationFailed {
                field: "items".to_string(),
                reason: format!("requested quantity of '{}' overflows", demand.item.name()),
            }
        })?;
    }
    Ok(cart)
}

#[derive(Debug, Clone)]
pub struct OrderFulfillmentEngine<S, B> {
    coordinator: InventoryMutationCoordinator<S, B>,
}

impl<S, B> OrderFulfillmentEngine<S, B>
where
    S: StockStore,
    B: EventBus<StockEvent>,
{
    pub fn new(coordinator: InventoryMutationCoordinator<S, B>) -> Self {
        Self { coordinator }
    }

    /// Validate the cart, reserve every line and persist the order, atomically.
    ///
    /// Failures name the offending line: `OutOfCatalog(name)` for an unknown
    /// product, `InsufficientStock(name, requested, available)` for a short one.
    pub fn place_order(&self, req: PlaceOrder) -> ServiceResult<Order> {
        let result = self.coordinator.execute(|m| {
            req.validate()?;
            let cart = resolve_cart(m, &req)?;

            // Check every line before touching any stock.
            for demand in &cart {
                if demand.requested > demand.item.quantity() {
                    return Err(ServiceError::InsufficientStock {
                        name: demand.item.name().to_string(),
                        requested: demand.requested,
                        available: demand.item.quantity(),
                    });
                }
            }

            let order_id = OrderId::new();
            let mut by_id: Vec<&Demand> = cart.iter().collect();
            by_id.sort_by_key(|demand| demand.item.id_typed());
            for Demand { item, requested } in by_id {
                let reserved = item.reserve(*requested, m.now())?;
                m.replace(item, reserved, MovementReason::OrderReserved { order_id })?;
            }

            let lines = cart
                .iter()
                .map(|Demand { item, requested }| OrderLine {
                    item_id: item.id_typed(),
                    name: item.name().to_string(),
                    quantity: *requested,
                    unit_price: item.unit_price(),
                })
                .collect();

            let order = Order::place(order_id, &req.customer, lines, req.delivery_price, m.now())?;
            m.put_order(order.clone())?;
            Ok(order)
        });

        match &result {
            Ok(order) => tracing::info!(
                order_id = %order.id_typed(),
                lines = order.lines().len(),
                total_price = order.total_price(),
                "order placed"
            ),
            Err(err) => tracing::warn!(
                customer = req.customer.name.trim(),
                error = %err,
                "order rejected"
            ),
        }
        result
    }

    pub fn get(&self, id: OrderId) -> ServiceResult<Order> {
        tracing::debug!(order_id = %id, "get order");
        self.coordinator
            .store()
            .read(|view| view.order(id).map_err(ServiceError::from))?
            .ok_or_else(|| ServiceError::not_found("order", id))
    }

    /// Orders in placement order.
    pub fn list(&self) -> ServiceResult<Vec<Order>> {
        self.coordinator
            .store()
            .read(|view| view.orders().map_err(ServiceError::from))
    }

    pub fn list_pending(&self) -> ServiceResult<Vec<Order>> {
        Ok(self.list()?.into_iter().filter(Order::is_pending).collect())
    }

    /// Any status may follow any other; stock is never touched.
    pub fn update_status(&self, id: OrderId, status: OrderStatus) -> ServiceResult<Order> {
        let order = self.coordinator.store().transaction(|tx| {
            let mut order = require_order(tx, id)?;
            order.set_status(status, chrono::Utc::now());
            tx.put_order(order.clone())?;
            Ok::<_, ServiceError>(order)
        })?;

        tracing::info!(order_id = %id, status = ?status, "order status updated");
        Ok(order)
    }

    /// Remove the order. Reserved stock is not returned to the catalog.
    pub fn delete(&self, id: OrderId) -> ServiceResult<Order> {
        let removed = self.coordinator.store().transaction(|tx| {
            tx.remove_order(id)?
                .ok_or_else(|| ServiceError::not_found("order", id))
        })?;

        tracing::info!(order_id = %id, "order deleted (stock not restocked)");
        Ok(removed)
    }
}

fn require_order(tx: &dyn StoreTx, id: OrderId) -> ServiceResult<Order> {
    tx.order(id)?
        .ok_or_else(|| ServiceError::not_found("order", id))
}
