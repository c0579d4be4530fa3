use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, DriverId, Entity};

/// Request: add a driver to the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub phone: String,
    pub vehicle_number: Option<String>,
}

/// Request: change some fields of a driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub vehicle_number: Option<Option<String>>,
}

/// Roster entry. Deliveries refer to drivers by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    id: DriverId,
    name: String,
    phone: String,
    vehicle_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(value.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl Driver {
    pub fn create(id: DriverId, new: NewDriver, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required("name", &new.name)?,
            phone: required("phone", &new.phone)?,
            vehicle_number: optional(new.vehicle_number.as_deref()),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> DriverId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn vehicle_number(&self) -> Option<&str> {
        self.vehicle_number.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn apply_patch(&self, patch: &DriverPatch, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = required("name", name)?;
        }
        if let Some(phone) = &patch.phone {
            next.phone = required("phone", phone)?;
        }
        if let Some(vehicle) = &patch.vehicle_number {
            next.vehicle_number = optional(vehicle.as_deref());
        }
        next.updated_at = now;
        Ok(next)
    }
}

impl Entity for Driver {
    type Id = DriverId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_driver() -> NewDriver {
        NewDriver {
            name: "Kasun".to_string(),
            phone: "+94 77 123 4567".to_string(),
            vehicle_number: Some("  ".to_string()),
        }
    }

    #[test]
    fn create_requires_name_and_phone() {
        let driver = Driver::create(DriverId::new(), new_driver(), Utc::now()).unwrap();
        assert_eq!(driver.vehicle_number(), None);

        let mut missing_phone = new_driver();
        missing_phone.phone = " ".to_string();
        match Driver::create(DriverId::new(), missing_phone, Utc::now()).unwrap_err() {
            DomainError::Validation { field, .. } => assert_eq!(field, "phone"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn patch_can_set_and_clear_vehicle() {
        let driver = Driver::create(DriverId::new(), new_driver(), Utc::now()).unwrap();

        let with_van = driver
            .apply_patch(
                &DriverPatch {
                    vehicle_number: Some(Some("WP CAB-1234".to_string())),
                    ..DriverPatch::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(with_van.vehicle_number(), Some("WP CAB-1234"));

        let cleared = with_van
            .apply_patch(
                &DriverPatch {
                    vehicle_number: Some(None),
                    ..DriverPatch::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(cleared.vehicle_number(), None);
        assert_eq!(cleared.id_typed(), driver.id_typed());
    }
}
