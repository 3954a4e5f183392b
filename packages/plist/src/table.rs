//! Slot table of [`Plist`] documents.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::Plist;
use crate::error::Error;
use crate::xml;

/// Index of a document in a [`PlistTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlistRef(u32);

impl PlistRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Generates an uppercase canonical UUID for a new document.
pub fn new_uuid() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

/// Documents addressed by [`PlistRef`]. Deleted slots are cleared and
/// handed out again before the table grows.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlistTable {
    plists: Vec<Plist>,
    free: Vec<u32>,
}

impl PlistTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots, live or free.
    pub fn len(&self) -> usize {
        self.plists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plists.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.plists.len() - self.free.len()
    }

    pub fn insert(&mut self, plist: Plist) -> PlistRef {
        match self.free.pop() {
            Some(slot) => {
                self.plists[slot as usize] = plist;
                PlistRef(slot)
            }
            None => {
                self.plists.push(plist);
                PlistRef((self.plists.len() - 1) as u32)
            }
        }
    }

    /// A new document seeded with `name` and a fresh uuid.
    pub fn create(&mut self, name: &str, filename: Option<&str>) -> PlistRef {
        let mut plist = Plist::create(name);
        if let Some(filename) = filename {
            plist.set_filename(filename);
        }
        self.insert(plist)
    }

    /// Parses the file and stores it. Nothing is stored on failure.
    pub fn load(&mut self, path: &Path) -> Result<PlistRef, Error> {
        let plist = xml::load_plist(path)?;
        Ok(self.insert(plist))
    }

    /// Stores a deep copy of `source` with its timestamp zeroed.
    pub fn copy(&mut self, source: PlistRef) -> PlistRef {
        let copy = self.get(source).deep_copy();
        self.insert(copy)
    }

    pub fn delete(&mut self, plist: PlistRef) {
        debug_assert!(
            !self.free.contains(&plist.0),
            "plist {} deleted twice",
            plist.0
        );
        self.plists[plist.index()] = Plist::default();
        self.free.push(plist.0);
    }

    pub fn get(&self, plist: PlistRef) -> &Plist {
        &self.plists[plist.index()]
    }

    pub fn get_mut(&mut self, plist: PlistRef) -> &mut Plist {
        &mut self.plists[plist.index()]
    }
}

#[cfg(test)]
mod table_tests {
    use super::*;

    #[test]
    fn deleted_slots_are_reused_before_growing() {
        let mut table = PlistTable::new();
        let refs: Vec<PlistRef> = (0..5)
            .map(|i| table.create(&format!("doc{}", i), None))
            .collect();
        assert_eq!(table.len(), 5);

        for r in &refs[1..4] {
            table.delete(*r);
        }
        assert_eq!(table.live_count(), 2);
        assert!(table.get(refs[2]).is_vacant());

        let reused: Vec<PlistRef> = (0..3).map(|_| table.create("new", None)).collect();
        assert_eq!(table.len(), 5);
        assert_eq!(table.live_count(), 5);
        for r in reused {
            assert!(refs[1..4].contains(&r));
            assert_eq!(table.get(r).root().get_string("name"), Some("new"));
        }

        table.create("grown", None);
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn copy_is_a_separate_unsaved_document() {
        let mut table = PlistTable::new();
        let original = table.create("theme", Some("theme.tmTheme"));
        table.get_mut(original).set_mod_time(99);

        let copy = table.copy(original);
        assert_ne!(copy, original);
        assert_eq!(table.get(copy).filename(), "theme.tmTheme");
        assert_eq!(table.get(copy).mod_time(), 0);

        table.get_mut(copy).root_mut().set_string("name", "edited");
        assert_eq!(table.get(original).root().get_string("name"), Some("theme"));
    }

    #[test]
    fn uuids_are_unique_and_uppercase() {
        let a = new_uuid();
        let b = new_uuid();
        assert_ne!(a, b);
        assert_eq!(a, a.to_uppercase());
    }
}
