use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, Entity, ItemId, OrderId};

/// Order status.
///
/// Free enum: any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Delivered,
    Cancelled,
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(DomainError::validation(
                "status",
                "must be one of: pending, processing, delivered, cancelled",
            )),
        }
    }
}

/// Who the order is for and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: String,
}

impl CustomerInfo {
    fn validated(&self) -> DomainResult<Self> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("customer.name", "must not be empty"));
        }
        let address = self.address.trim();
        if address.is_empty() {
            return Err(DomainError::validation("customer.address", "must not be empty"));
        }
        let email = match self.email.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(email) if !email.contains('@') => {
                return Err(DomainError::validation("customer.email", "is not an email address"));
            }
            Some(email) => Some(email.to_string()),
        };
        let phone = self
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Self {
            name: name.to_string(),
            email,
            phone,
            address: address.to_string(),
        })
    }
}

/// Demand for one catalog item, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub name: String,
    pub quantity: i64,
}

impl LineItemRequest {
    pub fn new(name: impl Into<String>, quantity: i64) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// Request: place an order for a cart of finished goods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub customer: CustomerInfo,
    pub items: Vec<LineItemRequest>,
    /// Price in smallest currency unit (e.g., cents).
    pub delivery_price: u64,
}

impl PlaceOrder {
    /// Shape checks that need no catalog lookups.
    pub fn validate(&self) -> DomainResult<()> {
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "items",
                "order must contain at least one line item",
            ));
        }
        for (idx, line) in self.items.iter().enumerate() {
            if line.name.trim().is_empty() {
                return Err(DomainError::validation(
                    format!("items[{idx}].name"),
                    "must not be empty",
                ));
            }
            if line.quantity <= 0 {
                return Err(DomainError::validation(
                    format!("items[{idx}].quantity"),
                    "must be positive",
                ));
            }
        }
        self.customer.validated()?;
        Ok(())
    }
}

/// Snapshotted order line: later catalog edits do not change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub name: String,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

impl OrderLine {
    pub fn line_total(&self) -> Option<u64> {
        u64::try_from(self.quantity)
            .ok()
            .and_then(|q| q.checked_mul(self.unit_price))
    }
}

/// A persisted customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer: CustomerInfo,
    lines: Vec<OrderLine>,
    delivery_price: u64,
    total_price: u64,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a pending order from already-reserved lines.
    pub fn place(
        id: OrderId,
        customer: &CustomerInfo,
        lines: Vec<OrderLine>,
        delivery_price: u64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "items",
                "order must contain at least one line item",
            ));
        }
        let customer = customer.validated()?;

        let mut total = delivery_price;
        for line in &lines {
            total = line
                .line_total()
                .and_then(|t| total.checked_add(t))
                .ok_or_else(|| DomainError::validation("total_price", "order total overflows"))?;
        }

        Ok(Self {
            id,
            customer,
            lines,
            delivery_price,
            total_price: total,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer(&self) -> &CustomerInfo {
        &self.customer
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn delivery_price(&self) -> u64 {
        self.delivery_price
    }

    pub fn total_price(&self) -> u64 {
        self.total_price
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn customer() -> CustomerInfo {
        CustomerInfo {
            name: " Nimal Perera ".to_string(),
            email: Some("nimal@example.com".to_string()),
            phone: Some("".to_string()),
            address: "12 Lake Road, Galle".to_string(),
        }
    }

    fn line(id: u64, name: &str, quantity: i64, unit_price: u64) -> OrderLine {
        OrderLine {
            item_id: ItemId::new(id),
            name: name.to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn empty_cart_is_rejected() {
        let req = PlaceOrder {
            customer: customer(),
            items: vec![],
            delivery_price: 0,
        };
        match req.validate().unwrap_err() {
            DomainError::Validation { field, .. } => assert_eq!(field, "items"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn non_positive_line_quantity_is_rejected() {
        let req = PlaceOrder {
            customer: customer(),
            items: vec![LineItemRequest::new("Doormat", 2), LineItemRequest::new("Rug", 0)],
            delivery_price: 0,
        };
        match req.validate().unwrap_err() {
            DomainError::Validation { field, .. } => assert_eq!(field, "items[1].quantity"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut c = customer();
        c.email = Some("nimal.example.com".to_string());
        let req = PlaceOrder {
            customer: c,
            items: vec![LineItemRequest::new("Doormat", 1)],
            delivery_price: 0,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn placed_order_is_pending_with_totals() {
        let order = Order::place(
            OrderId::new(),
            &customer(),
            vec![line(1, "Doormat", 3, 1_200), line(2, "Rug", 2, 4_500)],
            500,
            test_time(),
        )
        .unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_price(), 3 * 1_200 + 2 * 4_500 + 500);
        assert_eq!(order.customer().name, "Nimal Perera");
        assert_eq!(order.customer().phone, None);
    }

    #[test]
    fn total_overflow_is_a_validation_error() {
        let err = Order::place(
            OrderId::new(),
            &customer(),
            vec![line(1, "Doormat", 2, u64::MAX)],
            0,
            test_time(),
        )
        .unwrap_err();
        match err {
            DomainError::Validation { field, .. } => assert_eq!(field, "total_price"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn any_status_may_follow_any_other() {
        let mut order = Order::place(
            OrderId::new(),
            &customer(),
            vec![line(1, "Doormat", 1, 100)],
            0,
            test_time(),
        )
        .unwrap();

        order.set_status(OrderStatus::Delivered, test_time());
        order.set_status(OrderStatus::Pending, test_time());
        assert!(order.is_pending());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Processing".parse::<OrderStatus>().unwrap(), OrderStatus::Processing);
        assert_eq!("canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert_eq!(serde_json::to_string(&OrderStatus::Pending).unwrap(), r#""pending""#);
    }
}
