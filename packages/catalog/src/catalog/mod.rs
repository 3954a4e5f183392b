//! The [`BundleCatalog`]: themes, bundles and bundle items indexed across
//! their pristine, installed and local versions.
//!
//! The catalog is single-threaded. Callers serialize access; the only
//! background work is directory removal after a bundle is deleted. Changes
//! are kept in memory and written to the snapshot by [`BundleCatalog::flush`],
//! which hosts call from an idle or periodic timer through
//! [`BundleCatalog::flush_if_due`].

mod bundles;
mod export;
mod items;
mod scan;
mod themes;

use std::fs;
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bundlestore_plist::{Plist, PlistDict, PlistRef, PlistTable};

use crate::config::CatalogConfig;
use crate::db::CatalogDb;
use crate::error::CatalogError;
use crate::locality::Locality;

pub use bundles::BundleInfo;
pub use scan::{ScanStatus, UpdateMode};

/// A listed theme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemRef {
    pub id: usize,
    pub name: String,
}

pub struct BundleCatalog {
    config: CatalogConfig,
    db: CatalogDb,
    dirty: bool,
    last_commit: Instant,
    next_phase: Option<UpdateMode>,
    all_bundles_updated: bool,
    file_actions: Vec<JoinHandle<()>>,
}

impl BundleCatalog {
    /// Loads the snapshot and runs the fast [`UpdateMode::SyntaxOnly`] scan.
    /// The rest of the scan is left to [`resume_scan`](Self::resume_scan).
    pub fn open(config: CatalogConfig) -> Result<Self, CatalogError> {
        fs::create_dir_all(&config.app_data_path)?;
        let db = CatalogDb::open(&config.snapshot_path(), config.rebuild_db);
        let mut catalog = BundleCatalog {
            config,
            db,
            dirty: false,
            last_commit: Instant::now(),
            next_phase: Some(UpdateMode::SyntaxOnly),
            all_bundles_updated: false,
            file_actions: Vec::new(),
        };
        catalog.resume_scan();
        Ok(catalog)
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn plists(&self) -> &PlistTable {
        &self.db.plists
    }

    pub fn plist(&self, plist: PlistRef) -> &Plist {
        self.db.plists.get(plist)
    }

    pub(crate) fn dict(&self, plist: Option<PlistRef>) -> Option<PlistDict<'_>> {
        plist.map(|plist| self.db.plists.get(plist).root())
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Unflushed changes exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the snapshot if anything changed since the last write.
    pub fn flush(&mut self) -> Result<(), CatalogError> {
        if self.dirty {
            self.db.save(&self.config.snapshot_path())?;
            self.dirty = false;
        }
        self.last_commit = Instant::now();
        Ok(())
    }

    /// Flushes once the commit interval has passed since the last write.
    /// Returns true if a flush happened.
    pub fn flush_if_due(&mut self, now: Instant) -> Result<bool, CatalogError> {
        let interval = Duration::from_secs(self.config.commit_interval_secs);
        if !self.dirty || now.saturating_duration_since(self.last_commit) < interval {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Saves every theme marked modified, then flushes.
    pub fn commit(&mut self) -> Result<(), CatalogError> {
        let dir = self.config.local_themes_dir();
        let mut id = 0;
        while id < self.db.themes.len() {
            let entry = self.db.themes.entry(id);
            if entry.modified && entry.locality.contains(Locality::LOCAL) {
                if let Some(local) = entry.local_ref {
                    bundlestore_plist::save_plist(self.db.plists.get_mut(local), &dir)?;
                    self.db.themes.get_mut(id).modified = false;
                }
            }
            id += 1;
        }
        self.mark_dirty();
        self.flush()
    }

    /// Blocks until background directory removals have finished.
    pub fn wait_for_file_actions(&mut self) {
        for handle in self.file_actions.drain(..) {
            if handle.join().is_err() {
                log::warn!("File action thread panicked");
            }
        }
    }

    fn local_bundle_dir(&self, dir_name: &str) -> PathBuf {
        self.config.local_bundles_dir().join(dir_name)
    }

    /// The directory backing the factory version of a bundle.
    fn factory_bundle_dir(&self, locality: Locality, dir_name: &str) -> PathBuf {
        if locality.contains(Locality::INSTALLED) {
            self.config.installed_bundles_dir().join(dir_name)
        } else {
            self.config.pristine_bundles_dir().join(dir_name)
        }
    }
}

impl Drop for BundleCatalog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("Could not write catalog snapshot: {}", e);
        }
    }
}
