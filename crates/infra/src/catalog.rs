//! Per-kind stock catalog.
//!
//! All writes go through the mutation coordinator so that every quantity
//! change is paired with its ledger entry.

use stockline_core::{ExpectedVersion, ItemId};
use stockline_events::EventBus;
use stockline_inventory::{
    CatalogKind, ItemRef, MovementReason, NewStockItem, StockEvent, StockItem, StockItemPatch,
    normalize_name,
};

use crate::coordinator::{InventoryMutationCoordinator, Mutation};
use crate::error::{ServiceError, ServiceResult};
use crate::store::StockStore;

#[derive(Debug, Clone)]
pub struct StockCatalog<S, B> {
    coordinator: InventoryMutationCoordinator<S, B>,
}

fn ensure_name_free(
    m: &Mutation<'_>,
    kind: CatalogKind,
    name: &str,
    owner: Option<ItemId>,
) -> ServiceResult<()> {
    match m.item_by_name(kind, name)? {
        Some(existing) if Some(existing.id_typed()) != owner => Err(ServiceError::DuplicateName {
            kind: kind.to_string(),
            name: existing.name().to_string(),
        }),
        _ => Ok(()),
    }
}

impl<S, B> StockCatalog<S, B>
where
    S: StockStore,
    B: EventBus<StockEvent>,
{
    pub fn new(coordinator: InventoryMutationCoordinator<S, B>) -> Self {
        Self { coordinator }
    }

    /// Catalogue a new item. The initial quantity is recorded as an IN movement.
    pub fn create(&self, kind: CatalogKind, new: NewStockItem) -> ServiceResult<StockItem> {
        let item = self.coordinator.execute(|m| {
            new.validate(kind, m.now())?;
            ensure_name_free(m, kind, &new.name, None)?;

            let id = m.next_item_id(kind)?;
            let item = StockItem::create(kind, id, new, m.now())?;
            m.insert(item)
        })?;

        tracing::info!(
            item = %item.item_ref(),
            name = item.name(),
            quantity = item.quantity(),
            status = ?item.status(),
            "stock item created"
        );
        Ok(item)
    }

    pub fn get(&self, kind: CatalogKind, id: ItemId) -> ServiceResult<StockItem> {
        let item = ItemRef::new(kind, id);
        tracing::debug!(%item, "get stock item");
        self.coordinator
            .store()
            .read(|view| view.item(item).map_err(ServiceError::from))?
            .ok_or_else(|| ServiceError::not_found(kind.to_string(), id))
    }

    /// All items of a kind, ascending id.
    pub fn list(&self, kind: CatalogKind) -> ServiceResult<Vec<StockItem>> {
        tracing::debug!(%kind, "list stock items");
        self.coordinator
            .store()
            .read(|view| view.items(kind).map_err(ServiceError::from))
    }

    /// Lookup by name, ignoring case and surrounding/internal extra whitespace.
    pub fn find_by_name(&self, kind: CatalogKind, name: &str) -> ServiceResult<Option<StockItem>> {
        let key = normalize_name(name);
        self.coordinator
            .store()
            .read(|view| view.item_by_name(kind, &key).map_err(ServiceError::from))
    }

    /// Apply a patch. A quantity change records one movement for the delta.
    pub fn update(
        &self,
        kind: CatalogKind,
        id: ItemId,
        patch: StockItemPatch,
        expected: ExpectedVersion,
    ) -> ServiceResult<StockItem> {
        let (before, after) = self.coordinator.execute(|m| {
            let before = m.require_item(ItemRef::new(kind, id))?;
            expected.check(before.version())?;
            if let Some(name) = &patch.name {
                ensure_name_free(m, kind, name, Some(id))?;
            }

            let next = before.apply_patch(&patch, m.now())?;
            let after = m.replace(&before, next, MovementReason::Adjusted)?;
            Ok((before, after))
        })?;

        tracing::info!(
            item = %after.item_ref(),
            from = before.quantity(),
            to = after.quantity(),
            status = ?after.status(),
            version = after.version(),
            "stock item updated"
        );
        Ok(after)
    }

    /// Write off the remaining quantity, then remove the item.
    pub fn delete(&self, kind: CatalogKind, id: ItemId) -> ServiceResult<StockItem> {
        let removed = self.coordinator.execute(|m| {
            let item = m.require_item(ItemRef::new(kind, id))?;
            m.remove(&item)?;
            Ok(item)
        })?;

        tracing::info!(
            item = %removed.item_ref(),
            written_off = removed.quantity(),
            "stock item deleted"
        );
        Ok(removed)
    }

    /// At or below the reorder level, out of stock included.
    pub fn is_low_stock(&self, kind: CatalogKind, id: ItemId) -> ServiceResult<bool> {
        Ok(self.get(kind, id)?.is_low_stock())
    }

    pub fn list_low_stock(&self, kind: CatalogKind) -> ServiceResult<Vec<StockItem>> {
        Ok(self
            .list(kind)?
            .into_iter()
            .filter(StockItem::is_low_stock)
            .collect())
    }
}
