use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DeliveryId, DomainError, DriverId, Entity, OrderId};

use crate::driver::Driver;
use crate::order::Order;

/// Delivery status.
///
/// Free enum: any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Delayed,
    Completed,
}

impl core::str::FromStr for DeliveryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "delayed" => Ok(DeliveryStatus::Delayed),
            "completed" => Ok(DeliveryStatus::Completed),
            _ => Err(DomainError::validation(
                "delivery_status",
                "must be one of: Pending, Delayed, Completed",
            )),
        }
    }
}

/// A delivery derived from an order.
///
/// `driver_id` is a weak reference: the driver may since have left the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    id: DeliveryId,
    order_id: OrderId,
    recipient: String,
    address: String,
    status: DeliveryStatus,
    driver_id: Option<DriverId>,
    assigned_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Delivery {
    /// New, unassigned, pending delivery for `order`.
    pub fn for_order(id: DeliveryId, order: &Order, now: DateTime<Utc>) -> Self {
        Self {
            id,
            order_id: order.id_typed(),
            recipient: order.customer().name.clone(),
            address: order.customer().address.clone(),
            status: DeliveryStatus::Pending,
            driver_id: None,
            assigned_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id_typed(&self) -> DeliveryId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn driver_id(&self) -> Option<DriverId> {
        self.driver_id
    }

    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assigned_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True while this delivery keeps `driver` busy.
    pub fn occupies(&self, driver: DriverId) -> bool {
        self.status == DeliveryStatus::Pending && self.driver_id == Some(driver)
    }

    pub fn assign(&mut self, driver: DriverId, now: DateTime<Utc>) {
        self.driver_id = Some(driver);
        self.assigned_at = Some(now);
        self.updated_at = now;
    }

    /// Moving to `Completed` stamps the completion time; leaving it clears the stamp.
    pub fn set_status(&mut self, status: DeliveryStatus, now: DateTime<Utc>) {
        match status {
            DeliveryStatus::Completed if self.status != DeliveryStatus::Completed => {
                self.completed_at = Some(now);
            }
            DeliveryStatus::Completed => {}
            _ => self.completed_at = None,
        }
        self.status = status;
        self.updated_at = now;
    }
}

impl Entity for Delivery {
    type Id = DeliveryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Drivers not held by any pending delivery, in roster order.
pub fn available_drivers<'a>(drivers: &'a [Driver], deliveries: &[Delivery]) -> Vec<&'a Driver> {
    drivers
        .iter()
        .filter(|d| !deliveries.iter().any(|del| del.occupies(d.id_typed())))
        .collect()
}
