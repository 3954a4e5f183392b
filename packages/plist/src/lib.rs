//! Property-list documents stored as cell arenas.
//!
//! A [`Plist`] keeps its strings, dicts and arrays in three growable tables
//! and links them by typed index instead of by pointer. Deleted cells go on
//! per-table free lists and are reused before a table grows. Documents are
//! read from and written to Apple XML plists ([`load_plist`], [`save_plist`])
//! and can be projected to and from JSON for editing tools.
//!
//! A [`PlistTable`] holds many documents addressed by [`PlistRef`], with the
//! same slot reuse.

mod cell;
mod document;
mod error;
mod json;
mod table;
mod xml;

pub use cell::{ArrayRef, CellValue, DictRef, StringRef, ValueKind};
pub use document::{CellCounts, Plist, PlistArray, PlistArrayMut, PlistDict, PlistDictMut};
pub use error::Error;
pub use json::INTERNAL_KEYS;
pub use table::{new_uuid, PlistRef, PlistTable};
pub use xml::{file_mod_time, load_plist, parse_plist, save_plist, to_xml};
