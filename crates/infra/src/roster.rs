//! Driver roster. Deliveries only hold driver ids, so removing a driver
//! never touches existing deliveries.

use chrono::Utc;

use stockline_core::DriverId;
use stockline_sales::{Driver, DriverPatch, NewDriver};

use crate::error::{ServiceError, ServiceResult};
use crate::store::StockStore;

#[derive(Debug, Clone)]
pub struct DriverRoster<S> {
    store: S,
}

impl<S> DriverRoster<S>
where
    S: StockStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn create(&self, new: NewDriver) -> ServiceResult<Driver> {
        let driver = Driver::create(DriverId::new(), new, Utc::now())?;
        self.store
            .transaction(|tx| tx.put_driver(driver.clone()).map_err(ServiceError::from))?;

        tracing::info!(driver_id = %driver.id_typed(), name = driver.name(), "driver added");
        Ok(driver)
    }

    pub fn get(&self, id: DriverId) -> ServiceResult<Driver> {
        self.store
            .read(|view| view.driver(id).map_err(ServiceError::from))?
            .ok_or_else(|| ServiceError::not_found("driver", id))
    }

    /// Roster order (the order auto-assignment walks).
    pub fn list(&self) -> ServiceResult<Vec<Driver>> {
        self.store
            .read(|view| view.drivers().map_err(ServiceError::from))
    }

    pub fn update(&self, id: DriverId, patch: DriverPatch) -> ServiceResult<Driver> {
        let driver = self.store.transaction(|tx| {
            let current = tx
                .driver(id)?
                .ok_or_else(|| ServiceError::not_found("driver", id))?;
            let next = current.apply_patch(&patch, Utc::now())?;
            tx.put_driver(next.clone())?;
            Ok::<_, ServiceError>(next)
        })?;

        tracing::info!(driver_id = %id, "driver updated");
        Ok(driver)
    }

    pub fn delete(&self, id: DriverId) -> ServiceResult<Driver> {
        let removed = self.store.transaction(|tx| {
            tx.remove_driver(id)?
                .ok_or_else(|| ServiceError::not_found("driver", id))
        })?;

        tracing::info!(driver_id = %id, "driver removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::InMemoryStore;

    fn roster() -> DriverRoster<Arc<InMemoryStore>> {
        DriverRoster::new(Arc::new(InMemoryStore::new()))
    }

    fn new_driver(name: &str) -> NewDriver {
        NewDriver {
            name: name.to_string(),
            phone: "0771112222".to_string(),
            vehicle_number: Some("WP LH-4455".to_string()),
        }
    }

    #[test]
    fn crud_round_trip_keeps_roster_order() {
        let roster = roster();
        let a = roster.create(new_driver("Kasun")).unwrap();
        let b = roster.create(new_driver("Ruwan")).unwrap();

        let renamed = roster
            .update(
                a.id_typed(),
                DriverPatch {
                    name: Some("Kasun Jayasuriya".to_string()),
                    ..DriverPatch::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.name(), "Kasun Jayasuriya");

        // Updating keeps the roster position.
        let names: Vec<String> = roster.list().unwrap().iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["Kasun Jayasuriya".to_string(), "Ruwan".to_string()]);

        roster.delete(b.id_typed()).unwrap();
        assert!(matches!(
            roster.get(b.id_typed()).unwrap_err(),
            ServiceError::NotFound { .. }
        ));
    }

    #[test]
    fn blank_name_is_rejected_without_writing() {
        let roster = roster();
        let err = roster.create(new_driver("  ")).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed { .. }));
        assert!(roster.list().unwrap().is_empty());
    }

    #[test]
    fn invalid_patch_leaves_driver_unchanged() {
        let roster = roster();
        let driver = roster.create(new_driver("Kasun")).unwrap();

        let patch = DriverPatch {
            phone: Some(" ".to_string()),
            ..DriverPatch::default()
        };
        assert!(roster.update(driver.id_typed(), patch).is_err());
        assert_eq!(roster.get(driver.id_typed()).unwrap(), driver);
    }
}
