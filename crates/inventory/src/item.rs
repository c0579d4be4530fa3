use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, Entity, ItemId};

use crate::kind::{CatalogKind, ItemRef};

const MAX_NAME_LEN: usize = 120;

/// Stock status, derived from quantity and reorder level.
///
/// One label set for every catalog kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    OutOfStock,
    Low,
    InStock,
}

impl StockStatus {
    /// `OutOfStock` iff quantity is zero, `Low` iff `0 < quantity <= reorder_level`.
    pub fn derive(quantity: i64, reorder_level: i64) -> Self {
        if quantity <= 0 {
            StockStatus::OutOfStock
        } else if quantity <= reorder_level {
            StockStatus::Low
        } else {
            StockStatus::InStock
        }
    }

    /// At or below the reorder level (out of stock included).
    pub fn needs_reorder(self) -> bool {
        !matches!(self, StockStatus::InStock)
    }
}

/// Fixed storage zones of the plant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageLocation {
    WarehouseA,
    WarehouseB,
    WarehouseC,
    ColdStore,
    ProductionFloor,
    DispatchBay,
}

impl StorageLocation {
    pub const ALL: [StorageLocation; 6] = [
        StorageLocation::WarehouseA,
        StorageLocation::WarehouseB,
        StorageLocation::WarehouseC,
        StorageLocation::ColdStore,
        StorageLocation::ProductionFloor,
        StorageLocation::DispatchBay,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StorageLocation::WarehouseA => "Warehouse A",
            StorageLocation::WarehouseB => "Warehouse B",
            StorageLocation::WarehouseC => "Warehouse C",
            StorageLocation::ColdStore => "Cold Store",
            StorageLocation::ProductionFloor => "Production Floor",
            StorageLocation::DispatchBay => "Dispatch Bay",
        }
    }
}

impl core::str::FromStr for StorageLocation {
    type Err = DomainError;

    /// Accepts the display label or the variant name, ignoring case and spacing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        StorageLocation::ALL
            .into_iter()
            .find(|loc| loc.label().replace(' ', "").to_lowercase() == wanted)
            .ok_or_else(|| {
                DomainError::validation("location", format!("unknown storage location '{s}'"))
            })
    }
}

/// Display form of a name: trimmed, internal whitespace collapsed.
pub fn display_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uniqueness key of a name within a kind: display form, case-folded.
pub fn normalize_name(raw: &str) -> String {
    display_name(raw).to_lowercase()
}

fn validate_name(raw: &str) -> DomainResult<String> {
    let name = display_name(raw);
    if name.is_empty() {
        return Err(DomainError::validation("name", "must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(name)
}

fn validate_unit(raw: &str) -> DomainResult<String> {
    let unit = raw.trim();
    if unit.is_empty() {
        return Err(DomainError::validation("unit", "must not be empty"));
    }
    Ok(unit.to_string())
}

fn validate_reorder_level(level: i64) -> DomainResult<()> {
    if level < 0 {
        return Err(DomainError::validation("reorder_level", "must not be negative"));
    }
    Ok(())
}

fn validate_dates_in_order(received: DateTime<Utc>, expiry: DateTime<Utc>) -> DomainResult<()> {
    if expiry <= received {
        return Err(DomainError::validation(
            "expiry_date",
            "must be after the received date",
        ));
    }
    Ok(())
}

fn validate_expiry(expiry: DateTime<Utc>, now: DateTime<Utc>) -> DomainResult<()> {
    if expiry <= now {
        return Err(DomainError::validation("expiry_date", "must be in the future"));
    }
    Ok(())
}

/// Request: catalogue a new stock item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockItem {
    pub name: String,
    pub quantity: i64,
    pub unit: String,
    pub reorder_level: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    pub location: StorageLocation,
    /// Defaults to the creation time when absent.
    pub received_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl NewStockItem {
    /// Field checks for a new item of `kind`; uniqueness is checked by the catalog.
    pub fn validate(&self, kind: CatalogKind, now: DateTime<Utc>) -> DomainResult<()> {
        validate_name(&self.name)?;

        let min = kind.min_initial_quantity();
        if self.quantity < min {
            return Err(DomainError::validation(
                "quantity",
                format!("a new {kind} must have a quantity of at least {min}"),
            ));
        }

        validate_unit(&self.unit)?;
        validate_reorder_level(self.reorder_level)?;

        if let Some(expiry) = self.expiry_date {
            validate_expiry(expiry, now)?;
            validate_dates_in_order(self.received_date.unwrap_or(now), expiry)?;
        }
        Ok(())
    }
}

/// Request: change some fields of an existing stock item.
///
/// `expiry_date: Some(None)` clears the expiry date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItemPatch {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub unit: Option<String>,
    pub reorder_level: Option<i64>,
    pub unit_price: Option<u64>,
    pub location: Option<StorageLocation>,
    pub received_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<Option<DateTime<Utc>>>,
}

impl StockItemPatch {
    pub fn quantity(quantity: i64) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::default()
        }
    }
}

/// A catalogued item with its denormalized current quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    item: ItemRef,
    name: String,
    quantity: i64,
    unit: String,
    reorder_level: i64,
    unit_price: u64,
    location: StorageLocation,
    received_date: DateTime<Utc>,
    expiry_date: Option<DateTime<Utc>>,
    status: StockStatus,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StockItem {
    /// Validate a creation request and build the item (version 1).
    pub fn create(
        kind: CatalogKind,
        id: ItemId,
        new: NewStockItem,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        new.validate(kind, now)?;
        let name = display_name(&new.name);
        let unit = new.unit.trim().to_string();
        let received_date = new.received_date.unwrap_or(now);

        Ok(Self {
            item: ItemRef::new(kind, id),
            name,
            quantity: new.quantity,
            unit,
            reorder_level: new.reorder_level,
            unit_price: new.unit_price,
            location: new.location,
            received_date,
            expiry_date: new.expiry_date,
            status: StockStatus::derive(new.quantity, new.reorder_level),
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn item_ref(&self) -> ItemRef {
        self.item
    }

    pub fn kind(&self) -> CatalogKind {
        self.item.kind
    }

    pub fn id_typed(&self) -> ItemId {
        self.item.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uniqueness key within the kind.
    pub fn name_key(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn reorder_level(&self) -> i64 {
        self.reorder_level
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn location(&self) -> StorageLocation {
        self.location
    }

    pub fn received_date(&self) -> DateTime<Utc> {
        self.received_date
    }

    pub fn expiry_date(&self) -> Option<DateTime<Utc>> {
        self.expiry_date
    }

    pub fn status(&self) -> StockStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// At or below the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.status.needs_reorder()
    }

    /// Apply a patch, returning the new state. `self` is left untouched.
    pub fn apply_patch(&self, patch: &StockItemPatch, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut next = self.clone();

        if let Some(name) = &patch.name {
            next.name = validate_name(name)?;
        }
        if let Some(quantity) = patch.quantity {
            if quantity < 0 {
                return Err(DomainError::validation("quantity", "must not be negative"));
            }
            next.quantity = quantity;
        }
        if let Some(unit) = &patch.unit {
            next.unit = validate_unit(unit)?;
        }
        if let Some(level) = patch.reorder_level {
            validate_reorder_level(level)?;
            next.reorder_level = level;
        }
        if let Some(price) = patch.unit_price {
            next.unit_price = price;
        }
        if let Some(location) = patch.location {
            next.location = location;
        }
        if let Some(received) = patch.received_date {
            next.received_date = received;
        }
        if let Some(expiry) = patch.expiry_date {
            if let Some(at) = expiry {
                validate_expiry(at, now)?;
            }
            next.expiry_date = expiry;
        }
        if patch.received_date.is_some() || patch.expiry_date.is_some() {
            if let Some(expiry) = next.expiry_date {
                validate_dates_in_order(next.received_date, expiry)?;
            }
        }

        next.touch(now);
        Ok(next)
    }

    /// Take `requested` units out of stock, returning the new state.
    pub fn reserve(&self, requested: i64, now: DateTime<Utc>) -> DomainResult<Self> {
        if requested <= 0 {
            return Err(DomainError::validation("quantity", "must be positive"));
        }
        if requested > self.quantity {
            return Err(DomainError::insufficient_stock(
                self.name.clone(),
                requested,
                self.quantity,
            ));
        }

        let mut next = self.clone();
        next.quantity -= requested;
        next.touch(now);
        Ok(next)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.status = StockStatus::derive(self.quantity, self.reorder_level);
        self.version += 1;
        self.updated_at = now;
    }
}

impl Entity for StockItem {
    type Id = ItemRef;

    fn id(&self) -> &Self::Id {
        &self.item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn coir(quantity: i64) -> NewStockItem {
        NewStockItem {
            name: "  Coir   Fiber ".to_string(),
            quantity,
            unit: "kg".to_string(),
            reorder_level: 100,
            unit_price: 250,
            location: StorageLocation::WarehouseA,
            received_date: None,
            expiry_date: None,
        }
    }

    fn create(kind: CatalogKind, new: NewStockItem) -> DomainResult<StockItem> {
        StockItem::create(kind, ItemId::new(1), new, test_time())
    }

    #[test]
    fn status_follows_quantity_against_reorder_level() {
        assert_eq!(StockStatus::derive(0, 10), StockStatus::OutOfStock);
        assert_eq!(StockStatus::derive(1, 10), StockStatus::Low);
        assert_eq!(StockStatus::derive(10, 10), StockStatus::Low);
        assert_eq!(StockStatus::derive(11, 10), StockStatus::InStock);
        assert_eq!(StockStatus::derive(0, 0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::derive(1, 0), StockStatus::InStock);
    }

    #[test]
    fn status_labels_are_shared_by_every_kind() {
        let json = serde_json::to_string(&[
            StockStatus::OutOfStock,
            StockStatus::Low,
            StockStatus::InStock,
        ])
        .unwrap();
        assert_eq!(json, r#"["OutOfStock","Low","InStock"]"#);
    }

    #[test]
    fn create_trims_name_and_derives_status() {
        let item = create(CatalogKind::RawMaterial, coir(500)).unwrap();
        assert_eq!(item.name(), "Coir Fiber");
        assert_eq!(item.name_key(), "coir fiber");
        assert_eq!(item.status(), StockStatus::InStock);
        assert_eq!(item.version(), 1);
        assert_eq!(item.item_ref(), ItemRef::new(CatalogKind::RawMaterial, ItemId::new(1)));
    }

    #[test]
    fn create_rejects_blank_name() {
        let mut new = coir(5);
        new.name = "   ".to_string();
        match create(CatalogKind::RawMaterial, new).unwrap_err() {
            DomainError::Validation { field, .. } => assert_eq!(field, "name"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn quantity_bounds_depend_on_kind() {
        assert!(create(CatalogKind::RawMaterial, coir(0)).is_err());
        assert!(create(CatalogKind::PackingMaterial, coir(0)).is_err());
        let product = create(CatalogKind::FinalProduct, coir(0)).unwrap();
        assert_eq!(product.status(), StockStatus::OutOfStock);
        assert!(create(CatalogKind::FinalProduct, coir(-1)).is_err());
    }

    #[test]
    fn expiry_must_be_in_the_future() {
        let mut new = coir(5);
        new.expiry_date = Some(test_time() - Duration::days(1));
        match create(CatalogKind::RawMaterial, new).unwrap_err() {
            DomainError::Validation { field, .. } => assert_eq!(field, "expiry_date"),
            other => panic!("expected validation error, got {other:?}"),
        }

        let mut new = coir(5);
        new.expiry_date = Some(test_time() + Duration::days(30));
        assert!(create(CatalogKind::RawMaterial, new).is_ok());
    }

    #[test]
    fn patch_rederives_status_and_bumps_version() {
        let item = create(CatalogKind::RawMaterial, coir(500)).unwrap();

        let low = item.apply_patch(&StockItemPatch::quantity(80), test_time()).unwrap();
        assert_eq!(low.status(), StockStatus::Low);
        assert_eq!(low.version(), 2);

        let empty = low.apply_patch(&StockItemPatch::quantity(0), test_time()).unwrap();
        assert_eq!(empty.status(), StockStatus::OutOfStock);

        // The original is untouched.
        assert_eq!(item.quantity(), 500);
    }

    #[test]
    fn raising_reorder_level_can_flip_status_to_low() {
        let item = create(CatalogKind::RawMaterial, coir(150)).unwrap();
        let patch = StockItemPatch {
            reorder_level: Some(200),
            ..StockItemPatch::default()
        };
        let next = item.apply_patch(&patch, test_time()).unwrap();
        assert_eq!(next.status(), StockStatus::Low);
    }

    #[test]
    fn patch_keeps_expiry_after_the_received_date() {
        let now = test_time();
        let mut new = coir(10);
        new.expiry_date = Some(now + Duration::days(10));
        let item = create(CatalogKind::RawMaterial, new).unwrap();

        let late_receipt = StockItemPatch {
            received_date: Some(now + Duration::days(40)),
            ..StockItemPatch::default()
        };
        match item.apply_patch(&late_receipt, now).unwrap_err() {
            DomainError::Validation { field, .. } => assert_eq!(field, "expiry_date"),
            other => panic!("expected validation error, got {other:?}"),
        }

        let backdated = StockItemPatch {
            received_date: Some(now + Duration::days(5)),
            expiry_date: Some(Some(now + Duration::days(2))),
            ..StockItemPatch::default()
        };
        assert!(item.apply_patch(&backdated, now).is_err());

        let cleared = StockItemPatch {
            received_date: Some(now + Duration::days(40)),
            expiry_date: Some(None),
            ..StockItemPatch::default()
        };
        assert!(item.apply_patch(&cleared, now).is_ok());
    }

    #[test]
    fn patch_rejects_negative_quantity() {
        let item = create(CatalogKind::RawMaterial, coir(10)).unwrap();
        assert!(item.apply_patch(&StockItemPatch::quantity(-1), test_time()).is_err());
    }

    #[test]
    fn reserve_refuses_more_than_on_hand() {
        let mut new = coir(5);
        new.name = "Doormat".to_string();
        let item = create(CatalogKind::FinalProduct, new).unwrap();

        let err = item.reserve(10, test_time()).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock("Doormat", 10, 5));

        let after = item.reserve(5, test_time()).unwrap();
        assert_eq!(after.quantity(), 0);
        assert_eq!(after.status(), StockStatus::OutOfStock);
    }

    #[test]
    fn storage_location_parses_labels() {
        assert_eq!("warehouse a".parse::<StorageLocation>().unwrap(), StorageLocation::WarehouseA);
        assert_eq!("DispatchBay".parse::<StorageLocation>().unwrap(), StorageLocation::DispatchBay);
        assert_eq!("cold_store".parse::<StorageLocation>().unwrap(), StorageLocation::ColdStore);
        assert!("Basement".parse::<StorageLocation>().is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: after any patch sequence, status agrees with quantity and reorder level.
            #[test]
            fn status_is_always_consistent(
                initial in 1i64..10_000,
                reorder_level in 0i64..500,
                updates in prop::collection::vec((0i64..10_000, proptest::option::of(0i64..500)), 0..20)
            ) {
                let mut new = coir(initial);
                new.reorder_level = reorder_level;
                let mut item = create(CatalogKind::RawMaterial, new).unwrap();

                for (quantity, level) in updates {
                    let patch = StockItemPatch {
                        quantity: Some(quantity),
                        reorder_level: level,
                        ..StockItemPatch::default()
                    };
                    item = item.apply_patch(&patch, Utc::now()).unwrap();

                    let expected = if item.quantity() == 0 {
                        StockStatus::OutOfStock
                    } else if item.quantity() <= item.reorder_level() {
                        StockStatus::Low
                    } else {
                        StockStatus::InStock
                    };
                    prop_assert_eq!(item.status(), expected);
                }
            }
        }
    }
}
