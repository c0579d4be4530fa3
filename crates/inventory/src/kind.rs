use serde::{Deserialize, Serialize};

use stockline_core::ItemId;

/// One of the three parallel inventories sharing the item/ledger shape.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CatalogKind {
    RawMaterial,
    PackingMaterial,
    FinalProduct,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 3] = [
        CatalogKind::RawMaterial,
        CatalogKind::PackingMaterial,
        CatalogKind::FinalProduct,
    ];

    /// Smallest quantity an item of this kind may be catalogued with.
    ///
    /// Materials are only catalogued when a lot is received; finished goods may
    /// be listed ahead of the first production run.
    pub fn min_initial_quantity(self) -> i64 {
        match self {
            CatalogKind::RawMaterial | CatalogKind::PackingMaterial => 1,
            CatalogKind::FinalProduct => 0,
        }
    }
}

impl core::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            CatalogKind::RawMaterial => "raw material",
            CatalogKind::PackingMaterial => "packing material",
            CatalogKind::FinalProduct => "final product",
        };
        f.write_str(label)
    }
}

/// Reference to a stock item: ids are only unique within a kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: CatalogKind,
    pub id: ItemId,
}

impl ItemRef {
    pub fn new(kind: CatalogKind, id: ItemId) -> Self {
        Self { kind, id }
    }
}

impl core::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} #{}", self.kind, self.id)
    }
}
