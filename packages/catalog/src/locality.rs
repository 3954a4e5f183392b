//! Locality flags and the per-kind entry tables that resolve which version
//! of an item is in effect.
//!
//! An entry points at up to two documents in the shared [`PlistTable`]: the
//! factory version (pristine, or installed which overrides it) and the
//! user's local version. The local version always wins. A disabled entry has
//! no effective version at all.

use std::fs;
use std::io;
use std::path::Path;

use bitflags::bitflags;
use bundlestore_plist::{PlistRef, PlistTable};
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Locality: u32 {
        const PRISTINE = 1;
        const LOCAL = 2;
        const DISABLED = 4;
        const DELETED = 8;
        const INSTALLED = 16;

        const FACTORY = Self::PRISTINE.bits() | Self::INSTALLED.bits();
        const SOURCES = Self::FACTORY.bits() | Self::LOCAL.bits();
    }
}

/// One logical bundle, theme or bundle item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub uuid: String,
    /// Cached `name` of the most recently registered version.
    pub name: String,
    pub locality: Locality,
    /// Edited in memory since the last save.
    pub modified: bool,
    pub pristine_ref: Option<PlistRef>,
    pub local_ref: Option<PlistRef>,
    /// Filename of a pristine version hidden behind the installed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadowed_file: Option<String>,
}

impl CatalogEntry {
    fn tombstone() -> Self {
        CatalogEntry {
            locality: Locality::DELETED,
            ..Default::default()
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.locality.contains(Locality::DELETED)
    }

    /// Has an effective version.
    pub fn is_visible(&self) -> bool {
        self.locality.intersects(Locality::SOURCES)
            && !self.locality.intersects(Locality::DISABLED | Locality::DELETED)
    }

    pub fn is_editable(&self) -> bool {
        self.locality.contains(Locality::LOCAL)
    }

    /// The effective version, if any.
    pub fn resolve(&self) -> Option<PlistRef> {
        if self.locality.intersects(Locality::DISABLED | Locality::DELETED) {
            None
        } else if self.locality.contains(Locality::LOCAL) {
            self.local_ref
        } else if self.locality.intersects(Locality::FACTORY) {
            self.pristine_ref
        } else {
            None
        }
    }

    /// The document backing `loc`, where installed and pristine share a slot.
    pub fn ref_for(&self, loc: Locality) -> Option<PlistRef> {
        if loc.contains(Locality::LOCAL) {
            self.local_ref
        } else {
            self.pristine_ref
        }
    }

    /// A local version that has never been written to disk.
    pub fn has_unsaved_local(&self, plists: &PlistTable) -> bool {
        match self.local_ref {
            Some(local) if self.locality.contains(Locality::LOCAL) => {
                plists.get(local).mod_time() == 0
            }
            _ => false,
        }
    }

    fn refresh_identity(&mut self, plists: &PlistTable, plist: PlistRef) {
        let root = plists.get(plist).root();
        match root.get_string("uuid") {
            Some(uuid) => {
                if self.uuid != uuid {
                    self.uuid = uuid.to_owned();
                }
            }
            None => log::warn!("{} has no uuid", plists.get(plist).filename()),
        }
        if let Some(name) = root.get_string("name") {
            self.name = name.to_owned();
        }
    }
}

/// A row type stored in an [`EntryTable`].
pub trait Tracked {
    fn entry(&self) -> &CatalogEntry;
    fn entry_mut(&mut self) -> &mut CatalogEntry;
    fn with_entry(entry: CatalogEntry) -> Self;

    /// Called when `dropped` localities are removed from the row.
    fn release(&mut self, _dropped: Locality, _plists: &mut PlistTable) {}
}

impl Tracked for CatalogEntry {
    fn entry(&self) -> &CatalogEntry {
        self
    }

    fn entry_mut(&mut self) -> &mut CatalogEntry {
        self
    }

    fn with_entry(entry: CatalogEntry) -> Self {
        entry
    }
}

/// Rows addressed by stable ids. A removed row becomes a tombstone that
/// later inserts reuse; trailing tombstones are truncated.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryTable<T> {
    rows: Vec<T>,
}

impl<T> Default for EntryTable<T> {
    fn default() -> Self {
        EntryTable { rows: Vec::new() }
    }
}

impl<T: Tracked> EntryTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, tombstones included.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: usize) -> &T {
        &self.rows[id]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut T {
        &mut self.rows[id]
    }

    pub fn entry(&self, id: usize) -> &CatalogEntry {
        self.rows[id].entry()
    }

    pub fn locality(&self, id: usize) -> Locality {
        self.rows[id].entry().locality
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.rows.iter().enumerate()
    }

    /// Ids of rows with an effective version, in table order.
    pub fn visible_ids(&self) -> Vec<usize> {
        self.iter()
            .filter(|(_, row)| row.entry().is_visible())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn find_uuid(&self, uuid: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| !row.entry().is_tombstone() && row.entry().uuid == uuid)
    }

    pub fn find_name(&self, name: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| !row.entry().is_tombstone() && row.entry().name == name)
    }

    pub fn resolve(&self, id: usize) -> Option<PlistRef> {
        self.rows[id].entry().resolve()
    }

    /// The local version, cloned from the factory version on first use.
    pub fn resolve_editable(&mut self, id: usize, plists: &mut PlistTable) -> PlistRef {
        let entry = self.rows[id].entry_mut();
        if entry.locality.contains(Locality::LOCAL) {
            if let Some(local) = entry.local_ref {
                return local;
            }
        }
        let source = match entry.pristine_ref {
            Some(source) if entry.locality.intersects(Locality::FACTORY) => source,
            _ => panic!("entry {} has no version to edit", id),
        };
        let local = plists.copy(source);
        entry.local_ref = Some(local);
        entry.locality |= Locality::LOCAL;
        local
    }

    /// Adds a row for a document found or created at `loc`.
    pub fn insert(&mut self, plist: PlistRef, loc: Locality, plists: &PlistTable) -> usize {
        let mut entry = CatalogEntry {
            locality: loc,
            ..Default::default()
        };
        if loc.contains(Locality::LOCAL) {
            entry.local_ref = Some(plist);
        } else {
            entry.pristine_ref = Some(plist);
        }
        entry.refresh_identity(plists, plist);

        let row = T::with_entry(entry);
        match self.rows.iter().position(|r| r.entry().is_tombstone()) {
            Some(id) => {
                self.rows[id] = row;
                id
            }
            None => {
                self.rows.push(row);
                self.rows.len() - 1
            }
        }
    }

    /// Records a (re)loaded document for `loc`, freeing the one it replaces.
    ///
    /// A pristine document never displaces an installed one: the flag is
    /// recorded but the document is released.
    pub fn register_update(
        &mut self,
        id: usize,
        plist: PlistRef,
        loc: Locality,
        plists: &mut PlistTable,
    ) {
        let entry = self.rows[id].entry_mut();
        if loc.contains(Locality::LOCAL) {
            if let Some(old) = entry.local_ref.replace(plist) {
                plists.delete(old);
            }
        } else if loc == Locality::PRISTINE && entry.locality.contains(Locality::INSTALLED) {
            entry.shadowed_file = Some(plists.get(plist).filename().to_owned());
            plists.delete(plist);
            entry.locality |= loc;
            return;
        } else if let Some(old) = entry.pristine_ref.replace(plist) {
            plists.delete(old);
        }
        entry.locality |= loc;
        entry.refresh_identity(plists, plist);
    }

    /// Drops the `loc` versions of a row, removing the row when nothing is
    /// left. Returns true if the row was removed.
    pub fn drop_locality(&mut self, id: usize, loc: Locality, plists: &mut PlistTable) -> bool {
        let mut loc = loc;
        let row = &mut self.rows[id];
        let entry = row.entry_mut();
        // The factory slot belongs to the installed version when there is one.
        let factory = if entry.locality.contains(Locality::INSTALLED) {
            Locality::INSTALLED
        } else {
            Locality::PRISTINE
        };
        if loc.contains(factory) && entry.locality.contains(factory) {
            if let Some(plist) = entry.pristine_ref.take() {
                plists.delete(plist);
            }
            if factory == Locality::INSTALLED {
                loc |= Locality::PRISTINE;
            }
        }
        if loc.contains(Locality::LOCAL) && entry.locality.contains(Locality::LOCAL) {
            if let Some(local) = entry.local_ref.take() {
                plists.delete(local);
            }
        }
        entry.locality &= !loc;
        if loc.contains(Locality::PRISTINE) {
            entry.shadowed_file = None;
        }
        let remaining = entry.locality;
        row.release(loc, plists);

        if remaining.intersects(Locality::SOURCES) {
            false
        } else {
            self.remove_row(id, plists);
            true
        }
    }

    /// Drops `loc` from every row.
    pub fn drop_all(&mut self, loc: Locality, plists: &mut PlistTable) {
        let mut id = 0;
        while id < self.rows.len() {
            if self.locality(id).intersects(loc) {
                self.drop_locality(id, loc, plists);
            }
            id += 1;
        }
    }

    /// Like [`drop_all`](Self::drop_all), but keeps local versions that
    /// were never written to disk.
    pub fn drop_vanished(&mut self, loc: Locality, plists: &mut PlistTable) {
        let mut id = 0;
        while id < self.rows.len() {
            let entry = self.entry(id);
            if entry.locality.intersects(loc)
                && !(loc.contains(Locality::LOCAL) && entry.has_unsaved_local(plists))
            {
                self.drop_locality(id, loc, plists);
            }
            id += 1;
        }
    }

    /// User deletion. The local file and version go away; a factory
    /// version cannot be deleted and is disabled instead.
    pub fn remove(&mut self, id: usize, local_dir: &Path, plists: &mut PlistTable) -> io::Result<()> {
        let entry = self.rows[id].entry_mut();
        if entry.locality.contains(Locality::LOCAL) {
            if let Some(local) = entry.local_ref.take() {
                let filename = plists.get(local).filename();
                if !filename.is_empty() {
                    let path = local_dir.join(filename);
                    match fs::remove_file(&path) {
                        Ok(()) => log::debug!("Removed {}", path.display()),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => {
                            entry.local_ref = Some(local);
                            return Err(e);
                        }
                    }
                }
                plists.delete(local);
            }
            entry.locality.remove(Locality::LOCAL);
            entry.modified = false;
        }

        if entry.locality.intersects(Locality::FACTORY) {
            entry.locality |= Locality::DISABLED;
        } else {
            self.remove_row(id, plists);
        }
        Ok(())
    }

    /// Clears `Disabled` on a factory row. Returns false if there is
    /// nothing to restore.
    pub fn restore(&mut self, id: usize) -> bool {
        let entry = self.rows[id].entry_mut();
        if entry.locality.contains(Locality::DISABLED) && entry.locality.intersects(Locality::FACTORY) {
            entry.locality.remove(Locality::DISABLED);
            true
        } else {
            false
        }
    }

    fn remove_row(&mut self, id: usize, plists: &mut PlistTable) {
        let row = &mut self.rows[id];
        let entry = row.entry_mut();
        for plist in [entry.pristine_ref.take(), entry.local_ref.take()].into_iter().flatten() {
            plists.delete(plist);
        }
        row.release(Locality::all(), plists);

        if id + 1 == self.rows.len() {
            self.rows.pop();
            while self.rows.last().is_some_and(|row| row.entry().is_tombstone()) {
                self.rows.pop();
            }
        } else {
            self.rows[id] = T::with_entry(CatalogEntry::tombstone());
        }
    }
}

#[cfg(test)]
mod locality_tests {
    use bundlestore_plist::Plist;

    use super::*;

    fn doc(plists: &mut PlistTable, name: &str, uuid: &str) -> PlistRef {
        let mut plist = Plist::create(name);
        plist.root_mut().set_string("uuid", uuid);
        plist.set_filename(format!("{}.tmSnippet", name));
        plists.insert(plist)
    }

    fn name_of(plists: &PlistTable, plist: Option<PlistRef>) -> Option<String> {
        plist.map(|r| plists.get(r).root().get_string("name").unwrap().to_owned())
    }

    #[test]
    fn installed_wins_over_pristine_whatever_the_order() {
        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();

        let installed = doc(&mut plists, "installed", "U1");
        let id = table.insert(installed, Locality::INSTALLED, &plists);
        let pristine = doc(&mut plists, "pristine", "U1");
        table.register_update(id, pristine, Locality::PRISTINE, &mut plists);

        assert_eq!(table.locality(id), Locality::INSTALLED | Locality::PRISTINE);
        assert_eq!(name_of(&plists, table.resolve(id)).as_deref(), Some("installed"));
        assert_eq!(plists.live_count(), 1);
    }

    #[test]
    fn local_wins_over_factory_versions() {
        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();
        let id = table.insert(doc(&mut plists, "factory", "U1"), Locality::PRISTINE, &plists);
        table.register_update(id, doc(&mut plists, "mine", "U1"), Locality::LOCAL, &mut plists);
        assert_eq!(name_of(&plists, table.resolve(id)).as_deref(), Some("mine"));

        let other = table.insert(doc(&mut plists, "factory", "U2"), Locality::INSTALLED, &plists);
        table.register_update(other, doc(&mut plists, "mine too", "U2"), Locality::LOCAL, &mut plists);
        assert_eq!(name_of(&plists, table.resolve(other)).as_deref(), Some("mine too"));
    }

    #[test]
    fn editing_clones_once_and_leaves_other_entries_alone() {
        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();
        let a = table.insert(doc(&mut plists, "same", "A"), Locality::PRISTINE, &plists);
        let b = table.insert(doc(&mut plists, "same", "B"), Locality::PRISTINE, &plists);
        let factory_a = table.resolve(a).unwrap();

        let first = table.resolve_editable(a, &mut plists);
        let second = table.resolve_editable(a, &mut plists);
        assert_eq!(first, second);
        assert_ne!(first, factory_a);
        assert_eq!(table.locality(a), Locality::PRISTINE | Locality::LOCAL);
        assert_eq!(plists.get(first).mod_time(), 0);

        plists.get_mut(first).root_mut().set_string("name", "changed");
        assert_eq!(name_of(&plists, table.resolve(b)).as_deref(), Some("same"));
        assert_eq!(name_of(&plists, Some(factory_a)).as_deref(), Some("same"));
    }

    #[test]
    fn removing_a_local_edit_disables_the_factory_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();
        let id = table.insert(doc(&mut plists, "item", "U1"), Locality::PRISTINE, &plists);
        let local = table.resolve_editable(id, &mut plists);
        bundlestore_plist::save_plist(plists.get_mut(local), dir.path()).unwrap();
        let file = dir.path().join("item.tmSnippet");
        assert!(file.exists());

        table.remove(id, dir.path(), &mut plists).unwrap();
        assert!(!file.exists());
        assert_eq!(table.locality(id), Locality::PRISTINE | Locality::DISABLED);
        assert_eq!(table.resolve(id), None);
        assert!(table.visible_ids().is_empty());
        assert_eq!(plists.live_count(), 1);

        assert!(table.restore(id));
        assert_eq!(table.locality(id), Locality::PRISTINE);
        assert!(table.resolve(id).is_some());
        assert!(!table.restore(id));
    }

    #[test]
    fn removed_rows_become_tombstones_that_get_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();
        let ids: Vec<usize> = (0..4)
            .map(|i| {
                let plist = doc(&mut plists, &format!("n{}", i), &format!("U{}", i));
                table.insert(plist, Locality::LOCAL, &plists)
            })
            .collect();

        table.remove(ids[1], dir.path(), &mut plists).unwrap();
        assert_eq!(table.len(), 4);
        assert!(table.entry(ids[1]).is_tombstone());
        assert_eq!(table.find_uuid("U1"), None);

        let again = doc(&mut plists, "again", "U9");
        assert_eq!(table.insert(again, Locality::LOCAL, &plists), ids[1]);

        table.remove(ids[2], dir.path(), &mut plists).unwrap();
        table.remove(ids[3], dir.path(), &mut plists).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(plists.live_count(), 2);
    }

    #[test]
    fn dropping_installed_also_drops_pristine() {
        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();
        let id = table.insert(doc(&mut plists, "p", "U1"), Locality::PRISTINE, &plists);
        table.register_update(id, doc(&mut plists, "i", "U1"), Locality::INSTALLED, &mut plists);
        table.register_update(id, doc(&mut plists, "l", "U1"), Locality::LOCAL, &mut plists);
        assert_eq!(plists.live_count(), 2);

        assert!(!table.drop_locality(id, Locality::INSTALLED, &mut plists));
        assert_eq!(table.locality(id), Locality::LOCAL);
        assert_eq!(plists.live_count(), 1);

        assert!(table.drop_locality(id, Locality::LOCAL, &mut plists));
        assert!(table.is_empty());
        assert_eq!(plists.live_count(), 0);
    }

    #[test]
    fn drop_vanished_keeps_unsaved_local_versions() {
        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();
        let unsaved = table.insert(plists.create("new", None), Locality::LOCAL, &plists);
        let saved_ref = doc(&mut plists, "saved", "S");
        plists.get_mut(saved_ref).set_mod_time(42);
        let saved = table.insert(saved_ref, Locality::LOCAL, &plists);

        table.drop_vanished(Locality::LOCAL, &mut plists);
        assert!(table.entry(unsaved).is_visible());
        assert_eq!(saved, 1);
        assert_eq!(table.len(), 1);
    }
}
