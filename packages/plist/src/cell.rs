//! Cell types stored in a [`Plist`](crate::Plist) arena.
//!
//! Containers never hold their children directly. A dict entry or array
//! element is a [`CellValue`]: scalars are stored inline, strings and nested
//! containers are typed indices into the owning document's tables.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Index of a string cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringRef(pub(crate) u32);

/// Index of a dict cell. `DictRef::ROOT` is the document root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DictRef(pub(crate) u32);

/// Index of an array cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayRef(pub(crate) u32);

impl DictRef {
    pub const ROOT: DictRef = DictRef(0);
}

macro_rules! impl_index {
    ($($name:ident),*) => {
        $(impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        })*
    };
}

impl_index!(StringRef, DictRef, ArrayRef);

/// The kinds of value a plist can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Dict,
    Array,
    Integer,
    Bool,
}

/// A typed value slot in a dict or array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellValue {
    String(StringRef),
    Dict(DictRef),
    Array(ArrayRef),
    Integer(i64),
    Bool(bool),
}

impl CellValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            CellValue::String(_) => ValueKind::String,
            CellValue::Dict(_) => ValueKind::Dict,
            CellValue::Array(_) => ValueKind::Array,
            CellValue::Integer(_) => ValueKind::Integer,
            CellValue::Bool(_) => ValueKind::Bool,
        }
    }
}

/// Ordered key/value entries with hashed lookup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DictCell {
    pub(crate) entries: IndexMap<String, CellValue>,
}

/// Ordered values without keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrayCell {
    pub(crate) items: Vec<CellValue>,
}
