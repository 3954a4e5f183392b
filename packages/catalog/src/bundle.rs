use bundlestore_plist::PlistTable;
use serde::{Deserialize, Serialize};

use crate::kind::ItemKind;
use crate::locality::{CatalogEntry, EntryTable, Locality, Tracked};

/// A bundle row: the manifest entry plus one sub-table per [`ItemKind`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BundleEntry {
    pub entry: CatalogEntry,
    /// `<name>.tmbundle`, shared by every locality of the bundle. Empty until
    /// a new local bundle is first saved.
    pub dir_name: String,
    items: [EntryTable<CatalogEntry>; 6],
}

impl BundleEntry {
    pub fn items(&self, kind: ItemKind) -> &EntryTable<CatalogEntry> {
        &self.items[kind.index()]
    }

    pub fn items_mut(&mut self, kind: ItemKind) -> &mut EntryTable<CatalogEntry> {
        &mut self.items[kind.index()]
    }
}

impl Tracked for BundleEntry {
    fn entry(&self) -> &CatalogEntry {
        &self.entry
    }

    fn entry_mut(&mut self) -> &mut CatalogEntry {
        &mut self.entry
    }

    fn with_entry(entry: CatalogEntry) -> Self {
        BundleEntry {
            entry,
            ..Default::default()
        }
    }

    fn release(&mut self, dropped: Locality, plists: &mut PlistTable) {
        for table in &mut self.items {
            table.drop_all(dropped, plists);
        }
    }
}
