use std::path::PathBuf;

use bundlestore_plist::{file_mod_time, save_plist, PlistDict, PlistDictMut};
use lazy_static::lazy_static;
use regex::Regex;

use super::BundleCatalog;
use crate::error::CatalogError;
use crate::kind::{ItemKind, ReloadScope};
use crate::locality::Locality;
use crate::names::make_valid_name;

lazy_static! {
    static ref ITEM_URI: Regex = Regex::new(r"^bundle://([^/]+)/([^/]+)/(.+)$").unwrap();
}

impl BundleCatalog {
    /// Ids of the visible items of one kind in a bundle, in table order.
    pub fn list(&self, kind: ItemKind, bundle: usize) -> Vec<usize> {
        self.db.bundles.get(bundle).items(kind).visible_ids()
    }

    pub fn item_locality(&self, kind: ItemKind, bundle: usize, item: usize) -> Locality {
        self.db.bundles.get(bundle).items(kind).locality(item)
    }

    /// The effective version of an item.
    pub fn get(&self, kind: ItemKind, bundle: usize, item: usize) -> Option<PlistDict<'_>> {
        self.dict(self.db.bundles.get(bundle).items(kind).resolve(item))
    }

    /// The local version of an item, copied from the factory version on
    /// first use. The item is marked modified.
    pub fn get_editable(&mut self, kind: ItemKind, bundle: usize, item: usize) -> PlistDictMut<'_> {
        self.mark_dirty();
        let db = &mut self.db;
        let table = db.bundles.get_mut(bundle).items_mut(kind);
        let local = table.resolve_editable(item, &mut db.plists);
        table.get_mut(item).modified = true;
        db.plists.get_mut(local).root_mut()
    }

    /// Creates a local item seeded with `name` and a fresh uuid. Nothing is
    /// written until [`save`](Self::save).
    pub fn new_item(&mut self, kind: ItemKind, bundle: usize, name: &str) -> usize {
        let db = &mut self.db;
        let plist = db.plists.create(name, None);
        let id = db.bundles.get_mut(bundle).items_mut(kind).insert(plist, Locality::LOCAL, &db.plists);
        self.mark_dirty();
        id
    }

    /// Writes the local version of an item into the bundle's local
    /// directory, saving the bundle first if it has never been saved.
    pub fn save(&mut self, kind: ItemKind, bundle: usize, item: usize) -> Result<(), CatalogError> {
        let entry = self.db.bundles.get(bundle).items(kind).entry(item);
        let local = match entry.local_ref {
            Some(local) if entry.is_editable() => local,
            _ => {
                return Err(CatalogError::not_editable(format!(
                    "{:?} {} in bundle {}",
                    kind, item, bundle
                )))
            }
        };
        if self.db.bundles.get(bundle).dir_name.is_empty() {
            self.save_bundle(bundle)?;
        }

        let dir = self
            .local_bundle_dir(&self.db.bundles.get(bundle).dir_name)
            .join(kind.dir_name());
        let plist = self.db.plists.get_mut(local);
        if plist.filename().is_empty() {
            let name = plist.root().get_string("name").unwrap_or_default().to_owned();
            plist.set_filename(make_valid_name(&dir, &name, kind.extension()));
        }
        save_plist(plist, &dir)?;
        self.db.bundles.get_mut(bundle).items_mut(kind).get_mut(item).modified = false;
        self.mark_dirty();
        Ok(())
    }

    /// Removes an item's local version and file, or hides its factory
    /// version. Tells the host what it has to reload.
    pub fn delete(&mut self, kind: ItemKind, bundle: usize, item: usize) -> Result<ReloadScope, CatalogError> {
        let dir = self
            .local_bundle_dir(&self.db.bundles.get(bundle).dir_name)
            .join(kind.dir_name());
        let db = &mut self.db;
        db.bundles.get_mut(bundle).items_mut(kind).remove(item, &dir, &mut db.plists)?;
        self.mark_dirty();
        Ok(kind.reload_scope())
    }

    /// Brings back a factory item hidden by [`delete`](Self::delete).
    pub fn restore_item(&mut self, kind: ItemKind, bundle: usize, item: usize) -> bool {
        let restored = self.db.bundles.get_mut(bundle).items_mut(kind).restore(item);
        if restored {
            self.mark_dirty();
        }
        restored
    }

    /// File backing the effective version of an item.
    pub fn bundle_item_path(&self, kind: ItemKind, bundle: usize, item: usize) -> Option<PathBuf> {
        let row = self.db.bundles.get(bundle);
        let entry = row.items(kind).entry(item);
        let plist = entry.resolve()?;
        let dir = if entry.locality.contains(Locality::LOCAL) {
            self.local_bundle_dir(&row.dir_name)
        } else {
            self.factory_bundle_dir(entry.locality, &row.dir_name)
        };
        Some(dir.join(kind.dir_name()).join(self.db.plists.get(plist).filename()))
    }

    pub fn item_mod_date(&self, kind: ItemKind, bundle: usize, item: usize) -> Option<i64> {
        let path = self.bundle_item_path(kind, bundle, item)?;
        file_mod_time(&path).ok()
    }

    /// `bundle://<dir name>/<kind dir>/<filename>` for the effective version.
    pub fn item_uri(&self, kind: ItemKind, bundle: usize, item: usize) -> Option<String> {
        let row = self.db.bundles.get(bundle);
        let plist = row.items(kind).resolve(item)?;
        Some(format!(
            "bundle://{}/{}/{}",
            row.dir_name,
            kind.dir_name(),
            self.db.plists.get(plist).filename()
        ))
    }

    pub fn kind_from_uri(uri: &str) -> Option<ItemKind> {
        let captures = ITEM_URI.captures(uri)?;
        ItemKind::from_dir_name(&captures[2])
    }

    /// Finds the visible item an [`item_uri`](Self::item_uri) points at.
    pub fn item_from_uri(&self, uri: &str) -> Option<(ItemKind, usize, usize)> {
        let captures = ITEM_URI.captures(uri)?;
        let kind = ItemKind::from_dir_name(&captures[2])?;
        let filename = &captures[3];
        let (bundle, row) = self
            .db
            .bundles
            .iter()
            .find(|(_, row)| !row.entry.is_tombstone() && row.dir_name == captures[1])?;
        let item = row.items(kind).iter().position(|(_, entry)| {
            entry
                .resolve()
                .is_some_and(|plist| self.db.plists.get(plist).filename() == filename)
        })?;
        Some((kind, bundle, item))
    }

    /// Searches every bundle for an item with this uuid.
    pub fn item_from_uuid(&self, uuid: &str) -> Option<(ItemKind, usize, usize)> {
        self.db.bundles.iter().find_map(|(bundle, row)| {
            ItemKind::ALL
                .into_iter()
                .find_map(|kind| row.items(kind).find_uuid(uuid).map(|item| (kind, bundle, item)))
        })
    }
}
