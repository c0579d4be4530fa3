//! Delivery creation with greedy driver assignment.
//!
//! The availability check and the claim run in one unit of work, so two
//! concurrent deliveries can never be handed the same free driver.

use chrono::Utc;

use stockline_core::{DeliveryId, OrderId};
use stockline_sales::{Delivery, DeliveryStatus, Driver, available_drivers};

use crate::error::{ServiceError, ServiceResult};
use crate::store::StockStore;

#[derive(Debug, Clone)]
pub struct DeliveryDispatcher<S> {
    store: S,
}

impl<S> DeliveryDispatcher<S>
where
    S: StockStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a pending delivery for `order_id` and give it the first free
    /// driver in roster order. With no free driver the delivery stays unassigned.
    pub fn create_delivery(&self, order_id: OrderId) -> ServiceResult<Delivery> {
        let delivery = self.store.transaction(|tx| {
            let order = tx
                .order(order_id)?
                .ok_or_else(|| ServiceError::not_found("order", order_id))?;

            let now = Utc::now();
            let mut delivery = Delivery::for_order(DeliveryId::new(), &order, now);

            let drivers = tx.drivers()?;
            let deliveries = tx.deliveries()?;
            if let Some(driver) = available_drivers(&drivers, &deliveries).first() {
                delivery.assign(driver.id_typed(), now);
            }

            tx.put_delivery(delivery.clone())?;
            Ok::<_, ServiceError>(delivery)
        })?;

        match delivery.driver_id() {
            Some(driver_id) => tracing::info!(
                delivery_id = %delivery.id_typed(),
                %order_id,
                %driver_id,
                "delivery created and assigned"
            ),
            None => tracing::info!(
                delivery_id = %delivery.id_typed(),
                %order_id,
                "delivery created without a driver (none available)"
            ),
        }
        Ok(delivery)
    }

    pub fn get(&self, id: DeliveryId) -> ServiceResult<Delivery> {
        tracing::debug!(delivery_id = %id, "get delivery");
        self.store
            .read(|view| view.delivery(id).map_err(ServiceError::from))?
            .ok_or_else(|| ServiceError::not_found("delivery", id))
    }

    pub fn list(&self) -> ServiceResult<Vec<Delivery>> {
        self.store
            .read(|view| view.deliveries().map_err(ServiceError::from))
    }

    /// Drivers not held by a pending delivery, in roster order.
    pub fn available_drivers(&self) -> ServiceResult<Vec<Driver>> {
        self.store.read(|view| {
            let drivers = view.drivers()?;
            let deliveries = view.deliveries()?;
            Ok::<_, ServiceError>(
                available_drivers(&drivers, &deliveries)
                    .into_iter()
                    .cloned()
                    .collect(),
            )
        })
    }

    /// The assigned driver, if any and still on the roster.
    pub fn driver_of(&self, id: DeliveryId) -> ServiceResult<Option<Driver>> {
        self.store.read(|view| {
            let delivery = view
                .delivery(id)?
                .ok_or_else(|| ServiceError::not_found("delivery", id))?;
            match delivery.driver_id() {
                Some(driver_id) => Ok(view.driver(driver_id)?),
                None => Ok(None),
            }
        })
    }

    /// Any status may follow any other. Entering `Completed` stamps the completion time.
    pub fn update_status(&self, id: DeliveryId, status: DeliveryStatus) -> ServiceResult<Delivery> {
        let delivery = self.store.transaction(|tx| {
            let mut delivery = tx
                .delivery(id)?
                .ok_or_else(|| ServiceError::not_found("delivery", id))?;
            delivery.set_status(status, Utc::now());
            tx.put_delivery(delivery.clone())?;
            Ok::<_, ServiceError>(delivery)
        })?;

        tracing::info!(delivery_id = %id, status = ?status, "delivery status updated");
        Ok(delivery)
    }

    pub fn delete(&self, id: DeliveryId) -> ServiceResult<Delivery> {
        let removed = self.store.transaction(|tx| {
            tx.remove_delivery(id)?
                .ok_or_else(|| ServiceError::not_found("delivery", id))
        })?;

        tracing::info!(delivery_id = %id, "delivery deleted");
        Ok(removed)
    }
}
