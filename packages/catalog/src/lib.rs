//! Catalog of editor bundles and themes.
//!
//! Every bundle, theme and bundle item can exist in up to three versions: a
//! pristine one shipped with the application, an installed one downloaded
//! into the user's data directory, and a local one the user created or
//! edited. The catalog keeps all of them in one [`PlistTable`] and resolves
//! which is in effect: local beats installed, installed beats pristine.
//! Editing a factory version copies it first; deleting one only hides it.
//!
//! [`PlistTable`]: bundlestore_plist::PlistTable

mod bundle;
mod catalog;
mod config;
mod db;
mod error;
mod file_action;
mod kind;
mod locality;
mod names;

pub use bundle::BundleEntry;
pub use catalog::{BundleCatalog, BundleInfo, ItemRef, ScanStatus, UpdateMode};
pub use config::CatalogConfig;
pub use db::DB_VERSION;
pub use error::CatalogError;
pub use kind::{ItemKind, ReloadScope};
pub use locality::{CatalogEntry, EntryTable, Locality, Tracked};
pub use names::make_valid_name;
