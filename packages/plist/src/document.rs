//! The [`Plist`] document: three cell arenas with free lists, and borrowing
//! handles for reading and editing the dicts and arrays inside it.

use std::mem;

use serde::{Deserialize, Serialize};

use crate::cell::{ArrayCell, ArrayRef, CellValue, DictCell, DictRef, StringRef};
use crate::table::new_uuid;

/// One parsed property-list document.
///
/// Dict 0 is always the root. Refs handed out by a document are only valid
/// for that document; indexing with a stale or foreign ref panics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Plist {
    pub(crate) filename: String,
    pub(crate) mod_time: i64,
    pub(crate) strings: Vec<String>,
    pub(crate) dicts: Vec<DictCell>,
    pub(crate) arrays: Vec<ArrayCell>,
    pub(crate) free_strings: Vec<u32>,
    pub(crate) free_dicts: Vec<u32>,
    pub(crate) free_arrays: Vec<u32>,
}

/// Number of live cells per table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellCounts {
    pub strings: usize,
    pub dicts: usize,
    pub arrays: usize,
}

impl Plist {
    /// An empty document holding only the root dict.
    pub fn new() -> Self {
        Plist {
            dicts: vec![DictCell::default()],
            ..Default::default()
        }
    }

    /// A fresh document seeded with `name` and a new `uuid`.
    pub fn create(name: &str) -> Self {
        let mut plist = Plist::new();
        let mut root = plist.root_mut();
        root.set_string("name", name);
        root.set_string("uuid", &new_uuid());
        plist
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = filename.into();
    }

    /// Seconds since the epoch of the backing file, 0 if never saved.
    pub fn mod_time(&self) -> i64 {
        self.mod_time
    }

    pub fn set_mod_time(&mut self, secs: i64) {
        self.mod_time = secs;
    }

    /// A cleared table slot holds a document without a root.
    pub fn is_vacant(&self) -> bool {
        self.dicts.is_empty()
    }

    /// Deep copy for copy-on-write. The copy has never been saved.
    pub fn deep_copy(&self) -> Plist {
        let mut copy = self.clone();
        copy.mod_time = 0;
        copy
    }

    pub fn root(&self) -> PlistDict<'_> {
        self.dict(DictRef::ROOT)
    }

    pub fn root_mut(&mut self) -> PlistDictMut<'_> {
        self.dict_mut(DictRef::ROOT)
    }

    pub fn dict(&self, dict: DictRef) -> PlistDict<'_> {
        PlistDict { plist: self, dict }
    }

    pub fn dict_mut(&mut self, dict: DictRef) -> PlistDictMut<'_> {
        PlistDictMut { plist: self, dict }
    }

    pub fn array(&self, array: ArrayRef) -> PlistArray<'_> {
        PlistArray { plist: self, array }
    }

    pub fn array_mut(&mut self, array: ArrayRef) -> PlistArrayMut<'_> {
        PlistArrayMut { plist: self, array }
    }

    pub fn string(&self, string: StringRef) -> &str {
        &self.strings[string.index()]
    }

    pub fn add_string(&mut self, text: &str) -> StringRef {
        match self.free_strings.pop() {
            Some(slot) => {
                self.strings[slot as usize] = text.to_owned();
                StringRef(slot)
            }
            None => {
                self.strings.push(text.to_owned());
                StringRef((self.strings.len() - 1) as u32)
            }
        }
    }

    pub fn add_dict(&mut self) -> DictRef {
        match self.free_dicts.pop() {
            Some(slot) => DictRef(slot),
            None => {
                self.dicts.push(DictCell::default());
                DictRef((self.dicts.len() - 1) as u32)
            }
        }
    }

    pub fn add_array(&mut self) -> ArrayRef {
        match self.free_arrays.pop() {
            Some(slot) => ArrayRef(slot),
            None => {
                self.arrays.push(ArrayCell::default());
                ArrayRef((self.arrays.len() - 1) as u32)
            }
        }
    }

    /// Frees the cell behind `value` and everything it references.
    ///
    /// Freed slots are emptied before they go on the free list, so a reused
    /// slot never carries stale children.
    pub fn delete_value(&mut self, value: CellValue) {
        match value {
            CellValue::String(r) => {
                self.strings[r.index()] = String::new();
                self.free_strings.push(r.0);
            }
            CellValue::Dict(r) => {
                debug_assert_ne!(r, DictRef::ROOT, "the root dict cannot be deleted");
                let cell = mem::take(&mut self.dicts[r.index()]);
                for (_, child) in cell.entries {
                    self.delete_value(child);
                }
                self.free_dicts.push(r.0);
            }
            CellValue::Array(r) => {
                let cell = mem::take(&mut self.arrays[r.index()]);
                for child in cell.items {
                    self.delete_value(child);
                }
                self.free_arrays.push(r.0);
            }
            CellValue::Integer(_) | CellValue::Bool(_) => {}
        }
    }

    pub fn delete_string(&mut self, string: StringRef) {
        self.delete_value(CellValue::String(string));
    }

    pub fn delete_dict(&mut self, dict: DictRef) {
        self.delete_value(CellValue::Dict(dict));
    }

    pub fn delete_array(&mut self, array: ArrayRef) {
        self.delete_value(CellValue::Array(array));
    }

    pub fn live_cells(&self) -> CellCounts {
        CellCounts {
            strings: self.strings.len() - self.free_strings.len(),
            dicts: self.dicts.len() - self.free_dicts.len(),
            arrays: self.arrays.len() - self.free_arrays.len(),
        }
    }
}

/// Read-only view of one dict in a document.
#[derive(Clone, Copy)]
pub struct PlistDict<'a> {
    plist: &'a Plist,
    dict: DictRef,
}

impl<'a> PlistDict<'a> {
    pub fn dict_ref(&self) -> DictRef {
        self.dict
    }

    pub fn plist(&self) -> &'a Plist {
        self.plist
    }

    fn cell(&self) -> &'a DictCell {
        &self.plist.dicts[self.dict.index()]
    }

    pub fn len(&self) -> usize {
        self.cell().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell().entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.cell().entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'a str, CellValue)> + 'a {
        self.cell()
            .entries
            .iter()
            .map(|(key, value)| (key.as_str(), *value))
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.cell().entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<CellValue> {
        self.cell().entries.get(key).copied()
    }

    pub fn get_string(&self, key: &str) -> Option<&'a str> {
        match self.get(key)? {
            CellValue::String(r) => Some(&self.plist.strings[r.index()]),
            _ => None,
        }
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            CellValue::Integer(value) => Some(value),
            _ => None,
        }
    }

    /// Booleans, or integers read as non-zero.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            CellValue::Bool(value) => Some(value),
            CellValue::Integer(value) => Some(value != 0),
            _ => None,
        }
    }

    pub fn get_dict(&self, key: &str) -> Option<PlistDict<'a>> {
        match self.get(key)? {
            CellValue::Dict(dict) => Some(PlistDict {
                plist: self.plist,
                dict,
            }),
            _ => None,
        }
    }

    pub fn get_array(&self, key: &str) -> Option<PlistArray<'a>> {
        match self.get(key)? {
            CellValue::Array(array) => Some(PlistArray {
                plist: self.plist,
                array,
            }),
            _ => None,
        }
    }
}

/// Mutable view of one dict in a document.
pub struct PlistDictMut<'a> {
    pub(crate) plist: &'a mut Plist,
    pub(crate) dict: DictRef,
}

impl<'a> PlistDictMut<'a> {
    pub fn dict_ref(&self) -> DictRef {
        self.dict
    }

    pub fn as_dict(&self) -> PlistDict<'_> {
        PlistDict {
            plist: &*self.plist,
            dict: self.dict,
        }
    }

    fn cell_mut(&mut self) -> &mut DictCell {
        &mut self.plist.dicts[self.dict.index()]
    }

    /// Stores `value` under `key`, freeing whatever was there. An existing
    /// key keeps its position.
    pub(crate) fn replace(&mut self, key: &str, value: CellValue) {
        if let Some(old) = self.cell_mut().entries.insert(key.to_owned(), value) {
            self.plist.delete_value(old);
        }
    }

    pub fn set_string(&mut self, key: &str, text: &str) {
        if let Some(CellValue::String(r)) = self.as_dict().get(key) {
            self.plist.strings[r.index()] = text.to_owned();
            return;
        }
        let string = self.plist.add_string(text);
        self.replace(key, CellValue::String(string));
    }

    /// Like `set_string`, but an empty text removes the key.
    pub fn update_string(&mut self, key: &str, text: &str) {
        if text.is_empty() {
            self.delete_item(key);
        } else {
            self.set_string(key, text);
        }
    }

    pub fn set_integer(&mut self, key: &str, value: i64) {
        self.replace(key, CellValue::Integer(value));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.replace(key, CellValue::Bool(value));
    }

    pub fn delete_item(&mut self, key: &str) {
        if let Some(old) = self.cell_mut().entries.shift_remove(key) {
            self.plist.delete_value(old);
        }
    }

    pub fn clear(&mut self) {
        let cell = mem::take(self.cell_mut());
        for (_, value) in cell.entries {
            self.plist.delete_value(value);
        }
    }

    /// The dict under `key`, created if missing or of another type.
    pub fn new_dict(&mut self, key: &str) -> PlistDictMut<'_> {
        let dict = match self.as_dict().get(key) {
            Some(CellValue::Dict(dict)) => dict,
            _ => {
                let dict = self.plist.add_dict();
                self.replace(key, CellValue::Dict(dict));
                dict
            }
        };
        PlistDictMut {
            plist: &mut *self.plist,
            dict,
        }
    }

    /// The array under `key`, created if missing or of another type.
    pub fn new_array(&mut self, key: &str) -> PlistArrayMut<'_> {
        let array = match self.as_dict().get(key) {
            Some(CellValue::Array(array)) => array,
            _ => {
                let array = self.plist.add_array();
                self.replace(key, CellValue::Array(array));
                array
            }
        };
        PlistArrayMut {
            plist: &mut *self.plist,
            array,
        }
    }

    pub fn get_dict_mut(&mut self, key: &str) -> Option<PlistDictMut<'_>> {
        match self.as_dict().get(key)? {
            CellValue::Dict(dict) => Some(PlistDictMut {
                plist: &mut *self.plist,
                dict,
            }),
            _ => None,
        }
    }

    pub fn get_array_mut(&mut self, key: &str) -> Option<PlistArrayMut<'_>> {
        match self.as_dict().get(key)? {
            CellValue::Array(array) => Some(PlistArrayMut {
                plist: &mut *self.plist,
                array,
            }),
            _ => None,
        }
    }
}

/// Read-only view of one array in a document.
#[derive(Clone, Copy)]
pub struct PlistArray<'a> {
    plist: &'a Plist,
    array: ArrayRef,
}

impl<'a> PlistArray<'a> {
    pub fn array_ref(&self) -> ArrayRef {
        self.array
    }

    pub fn plist(&self) -> &'a Plist {
        self.plist
    }

    fn cell(&self) -> &'a ArrayCell {
        &self.plist.arrays[self.array.index()]
    }

    pub fn len(&self) -> usize {
        self.cell().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell().items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CellValue> + 'a {
        self.cell().items.iter().copied()
    }

    pub fn get(&self, index: usize) -> Option<CellValue> {
        self.cell().items.get(index).copied()
    }

    pub fn get_string(&self, index: usize) -> Option<&'a str> {
        match self.get(index)? {
            CellValue::String(r) => Some(&self.plist.strings[r.index()]),
            _ => None,
        }
    }

    pub fn get_integer(&self, index: usize) -> Option<i64> {
        match self.get(index)? {
            CellValue::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_bool(&self, index: usize) -> Option<bool> {
        match self.get(index)? {
            CellValue::Bool(value) => Some(value),
            CellValue::Integer(value) => Some(value != 0),
            _ => None,
        }
    }

    pub fn get_dict(&self, index: usize) -> Option<PlistDict<'a>> {
        match self.get(index)? {
            CellValue::Dict(dict) => Some(PlistDict {
                plist: self.plist,
                dict,
            }),
            _ => None,
        }
    }

    pub fn get_array(&self, index: usize) -> Option<PlistArray<'a>> {
        match self.get(index)? {
            CellValue::Array(array) => Some(PlistArray {
                plist: self.plist,
                array,
            }),
            _ => None,
        }
    }
}

/// Mutable view of one array in a document.
pub struct PlistArrayMut<'a> {
    pub(crate) plist: &'a mut Plist,
    pub(crate) array: ArrayRef,
}

impl<'a> PlistArrayMut<'a> {
    pub fn array_ref(&self) -> ArrayRef {
        self.array
    }

    pub fn as_array(&self) -> PlistArray<'_> {
        PlistArray {
            plist: &*self.plist,
            array: self.array,
        }
    }

    fn items_mut(&mut self) -> &mut Vec<CellValue> {
        &mut self.plist.arrays[self.array.index()].items
    }

    pub fn len(&self) -> usize {
        self.as_array().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_array().is_empty()
    }

    pub fn clear(&mut self) {
        let items = mem::take(self.items_mut());
        for value in items {
            self.plist.delete_value(value);
        }
    }

    pub fn delete_item(&mut self, index: usize) {
        if index < self.len() {
            let old = self.items_mut().remove(index);
            self.plist.delete_value(old);
        }
    }

    pub fn insert_string(&mut self, index: usize, text: &str) {
        let string = self.plist.add_string(text);
        self.items_mut().insert(index, CellValue::String(string));
    }

    pub fn insert_integer(&mut self, index: usize, value: i64) {
        self.items_mut().insert(index, CellValue::Integer(value));
    }

    pub fn insert_bool(&mut self, index: usize, value: bool) {
        self.items_mut().insert(index, CellValue::Bool(value));
    }

    pub fn insert_dict(&mut self, index: usize) -> PlistDictMut<'_> {
        let dict = self.plist.add_dict();
        self.items_mut().insert(index, CellValue::Dict(dict));
        PlistDictMut {
            plist: &mut *self.plist,
            dict,
        }
    }

    pub fn insert_array(&mut self, index: usize) -> PlistArrayMut<'_> {
        let array = self.plist.add_array();
        self.items_mut().insert(index, CellValue::Array(array));
        PlistArrayMut {
            plist: &mut *self.plist,
            array,
        }
    }

    pub fn push_string(&mut self, text: &str) {
        let end = self.len();
        self.insert_string(end, text);
    }

    pub fn push_integer(&mut self, value: i64) {
        self.items_mut().push(CellValue::Integer(value));
    }

    pub fn push_bool(&mut self, value: bool) {
        self.items_mut().push(CellValue::Bool(value));
    }

    pub fn push_dict(&mut self) -> PlistDictMut<'_> {
        let end = self.len();
        self.insert_dict(end)
    }

    pub fn push_array(&mut self) -> PlistArrayMut<'_> {
        let end = self.len();
        self.insert_array(end)
    }

    pub fn get_dict_mut(&mut self, index: usize) -> Option<PlistDictMut<'_>> {
        match self.as_array().get(index)? {
            CellValue::Dict(dict) => Some(PlistDictMut {
                plist: &mut *self.plist,
                dict,
            }),
            _ => None,
        }
    }

    pub fn get_array_mut(&mut self, index: usize) -> Option<PlistArrayMut<'_>> {
        match self.as_array().get(index)? {
            CellValue::Array(array) => Some(PlistArrayMut {
                plist: &mut *self.plist,
                array,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod document_tests {
    use super::*;

    #[test]
    fn create_seeds_name_and_uuid() {
        let plist = Plist::create("Hello");
        let root = plist.root();
        assert_eq!(root.get_string("name"), Some("Hello"));
        let uuid = root.get_string("uuid").unwrap();
        assert_eq!(uuid.len(), 36);
        assert_eq!(uuid.matches('-').count(), 4);
        assert_eq!(plist.mod_time(), 0);
        assert!(plist.filename().is_empty());
    }

    #[test]
    fn deleting_a_dict_frees_everything_below_it() {
        let mut plist = Plist::new();
        {
            let mut root = plist.root_mut();
            let mut settings = root.new_dict("settings");
            settings.set_string("foreground", "#000000");
            let mut list = settings.new_array("list");
            list.push_string("a");
            list.push_dict().set_string("b", "c");
        }
        assert_eq!(
            plist.live_cells(),
            CellCounts {
                strings: 3,
                dicts: 3,
                arrays: 1
            }
        );

        plist.root_mut().delete_item("settings");
        assert_eq!(
            plist.live_cells(),
            CellCounts {
                strings: 0,
                dicts: 1,
                arrays: 0
            }
        );
        assert!(plist.dicts[1..].iter().all(|d| d.entries.is_empty()));
        assert!(plist.strings.iter().all(String::is_empty));
    }

    #[test]
    fn freed_slots_are_reused_before_growing() {
        let mut plist = Plist::new();
        let a = plist.add_string("a");
        let b = plist.add_string("b");
        plist.delete_string(a);
        plist.delete_string(b);
        let c = plist.add_string("c");
        let d = plist.add_string("d");
        assert_eq!(plist.strings.len(), 2);
        assert_eq!(plist.string(c), "c");
        assert_eq!(plist.string(d), "d");

        let arr = plist.add_array();
        plist.delete_array(arr);
        assert_eq!(plist.add_array(), arr);
    }

    #[test]
    fn setters_replace_values_of_other_types_in_place() {
        let mut plist = Plist::new();
        let mut root = plist.root_mut();
        root.set_string("first", "x");
        root.set_string("second", "y");
        root.set_integer("first", 7);
        root.new_dict("second").set_bool("flag", true);

        let root = plist.root();
        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["first", "second"]);
        assert_eq!(root.get_integer("first"), Some(7));
        assert_eq!(root.get_dict("second").unwrap().get_bool("flag"), Some(true));
        assert_eq!(plist.live_cells().strings, 0);
    }

    #[test]
    fn new_dict_reuses_an_existing_dict() {
        let mut plist = Plist::new();
        plist.root_mut().new_dict("d").set_string("k", "v");
        let mut root = plist.root_mut();
        let again = root.new_dict("d");
        assert_eq!(again.as_dict().get_string("k"), Some("v"));
    }

    #[test]
    fn update_string_with_empty_text_removes_the_key() {
        let mut plist = Plist::create("x");
        plist.root_mut().update_string("name", "");
        assert!(!plist.root().has_key("name"));
        plist.root_mut().update_string("name", "y");
        assert_eq!(plist.root().get_string("name"), Some("y"));
    }

    #[test]
    fn deep_copy_is_independent_and_unsaved() {
        let mut original = Plist::create("orig");
        original.set_mod_time(1234);
        let mut copy = original.deep_copy();
        copy.root_mut().set_string("name", "changed");
        assert_eq!(original.root().get_string("name"), Some("orig"));
        assert_eq!(copy.mod_time(), 0);
        assert_eq!(original.mod_time(), 1234);
    }

    #[test]
    fn array_editing() {
        let mut plist = Plist::new();
        let mut root = plist.root_mut();
        let mut items = root.new_array("items");
        items.push_string("b");
        items.insert_string(0, "a");
        items.push_integer(3);
        items.push_bool(false);
        items.delete_item(2);
        items.delete_item(10);

        let items = plist.root().get_array("items").unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items.get_string(0), Some("a"));
        assert_eq!(items.get_string(1), Some("b"));
        assert_eq!(items.get_bool(2), Some(false));
    }
}
