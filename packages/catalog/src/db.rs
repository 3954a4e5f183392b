//! The catalog snapshot: every entry table plus the documents they point at.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use bundlestore_plist::PlistTable;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::bundle::BundleEntry;
use crate::error::CatalogError;
use crate::locality::{CatalogEntry, EntryTable};

/// Bumped whenever the snapshot layout changes. Older snapshots are thrown
/// away and rebuilt from the bundle directories.
pub const DB_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CatalogDb {
    pub version: u32,
    pub themes: EntryTable<CatalogEntry>,
    pub bundles: EntryTable<BundleEntry>,
    pub plists: PlistTable,
    /// File extension to syntax name.
    pub syntax_assocs: BTreeMap<String, String>,
}

impl Default for CatalogDb {
    fn default() -> Self {
        CatalogDb {
            version: DB_VERSION,
            themes: EntryTable::new(),
            bundles: EntryTable::new(),
            plists: PlistTable::new(),
            syntax_assocs: BTreeMap::new(),
        }
    }
}

impl CatalogDb {
    /// Loads the snapshot at `path`, or starts empty when there is none, it
    /// cannot be read, it is from another version or `rebuild` is set.
    pub fn open(path: &Path, rebuild: bool) -> CatalogDb {
        if !path.exists() {
            return CatalogDb::default();
        }
        if rebuild {
            log::info!("Rebuilding catalog, discarding {}", path.display());
            Self::discard(path);
            return CatalogDb::default();
        }

        log::debug!("Reading catalog {}", path.display());
        let loaded = fs::read(path)
            .map_err(CatalogError::from)
            .and_then(|bytes| Ok(serde_json::from_slice::<CatalogDb>(&bytes)?));
        match loaded {
            Ok(db) if db.version == DB_VERSION => db,
            Ok(db) => {
                log::info!(
                    "Catalog version {} does not match {}, rebuilding",
                    db.version,
                    DB_VERSION
                );
                Self::discard(path);
                CatalogDb::default()
            }
            Err(e) => {
                log::info!("Catalog {} is unreadable ({}), rebuilding", path.display(), e);
                Self::discard(path);
                CatalogDb::default()
            }
        }
    }

    fn discard(path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }

    /// Writes the snapshot through a temporary file in the same directory.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut file, self)?;
        file.flush()?;
        file.persist(path).map_err(|e| e.error)?;
        log::debug!("Wrote catalog {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod db_tests {
    use bundlestore_plist::Plist;

    use super::*;
    use crate::locality::Locality;

    #[test]
    fn snapshot_survives_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let mut db = CatalogDb::default();
        let theme = db.plists.insert(Plist::create("Dawn"));
        db.themes.insert(theme, Locality::PRISTINE, &db.plists);
        db.syntax_assocs.insert("rs".to_owned(), "Rust".to_owned());
        db.save(&path).unwrap();

        let loaded = CatalogDb::open(&path, false);
        assert_eq!(loaded.themes.len(), 1);
        assert_eq!(loaded.themes.entry(0).name, "Dawn");
        let plist = loaded.themes.resolve(0).unwrap();
        assert_eq!(loaded.plists.get(plist).root().get_string("name"), Some("Dawn"));
        assert_eq!(loaded.syntax_assocs.get("rs").map(String::as_str), Some("Rust"));
    }

    #[test]
    fn stale_or_corrupt_snapshots_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let mut old = CatalogDb::default();
        old.version = DB_VERSION - 1;
        let theme = old.plists.insert(Plist::create("Old"));
        old.themes.insert(theme, Locality::LOCAL, &old.plists);
        old.save(&path).unwrap();
        assert!(CatalogDb::open(&path, false).themes.is_empty());
        assert!(!path.exists());

        fs::write(&path, "not json").unwrap();
        assert!(CatalogDb::open(&path, false).themes.is_empty());
        assert!(!path.exists());

        CatalogDb::default().save(&path).unwrap();
        CatalogDb::open(&path, true);
        assert!(!path.exists());
    }
}
