use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use bundlestore_plist::{file_mod_time, save_plist, PlistDict, PlistDictMut};

use super::scan::UpdateMode;
use super::BundleCatalog;
use crate::error::CatalogError;
use crate::file_action;
use crate::locality::{Locality, Tracked};
use crate::names::make_valid_name;

const MANIFEST: &str = "info.plist";
const SUPPORT_DIR: &str = "Support";

/// Summary of a shipped or installed bundle, for update checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleInfo {
    pub id: usize,
    pub dir_name: String,
    pub uuid: String,
    pub disabled: bool,
    /// Timestamp of the manifest, 0 for disabled bundles.
    pub mod_date: i64,
}

impl BundleCatalog {
    /// Visible bundles ordered by name, ignoring case.
    pub fn bundles(&self) -> Vec<usize> {
        let mut ids = self.db.bundles.visible_ids();
        ids.sort_by_key(|&id| self.db.bundles.entry(id).name.to_lowercase());
        ids
    }

    pub fn bundle_info(&self, id: usize) -> Option<PlistDict<'_>> {
        self.dict(self.db.bundles.resolve(id))
    }

    pub fn editable_bundle_info(&mut self, id: usize) -> PlistDictMut<'_> {
        self.mark_dirty();
        let db = &mut self.db;
        let local = db.bundles.resolve_editable(id, &mut db.plists);
        db.plists.get_mut(local).root_mut()
    }

    pub fn bundle_dir_name(&self, id: usize) -> &str {
        &self.db.bundles.get(id).dir_name
    }

    pub fn bundle_locality(&self, id: usize) -> Locality {
        self.db.bundles.locality(id)
    }

    /// Creates a local bundle. Nothing is written until
    /// [`save_bundle`](Self::save_bundle).
    pub fn new_bundle(&mut self, name: &str) -> usize {
        let db = &mut self.db;
        let manifest = db.plists.create(name, Some(MANIFEST));
        let id = db.bundles.insert(manifest, Locality::LOCAL, &db.plists);
        self.mark_dirty();
        id
    }

    /// Writes the local manifest, choosing the bundle directory on the first
    /// save.
    pub fn save_bundle(&mut self, id: usize) -> Result<(), CatalogError> {
        let entry = self.db.bundles.entry(id);
        let local = match entry.local_ref {
            Some(local) if entry.is_editable() => local,
            _ => return Err(CatalogError::not_editable(format!("bundle {}", id))),
        };
        if self.db.bundles.get(id).dir_name.is_empty() {
            let name = self.db.plists.get(local).root().get_string("name").unwrap_or_default().to_owned();
            let dir_name = make_valid_name(&self.config.local_bundles_dir(), &name, ".tmbundle");
            self.db.bundles.get_mut(id).dir_name = dir_name;
        }

        let dir = self.local_bundle_dir(&self.db.bundles.get(id).dir_name);
        fs::create_dir_all(&dir)?;
        let manifest = self.db.plists.get_mut(local);
        if manifest.filename().is_empty() {
            manifest.set_filename(MANIFEST);
        }
        save_plist(manifest, &dir)?;
        self.db.bundles.get_mut(id).entry.modified = false;
        self.mark_dirty();
        Ok(())
    }

    /// Deletes the local and installed versions of a bundle and everything
    /// in them. Their directories are removed in the background.
    ///
    /// A shipped bundle cannot be deleted; it is disabled and `false` is
    /// returned. `true` means the bundle is gone from the catalog.
    pub fn delete_bundle(&mut self, id: usize) -> Result<bool, CatalogError> {
        let locality = self.db.bundles.locality(id);
        let dir_name = self.db.bundles.get(id).dir_name.clone();

        let mut doomed = Vec::new();
        if !dir_name.is_empty() {
            let local_dir = self.local_bundle_dir(&dir_name);
            if local_dir.is_dir() {
                doomed.push(local_dir);
            }
            if locality.contains(Locality::INSTALLED) {
                let installed_dir = self.config.installed_bundles_dir().join(&dir_name);
                if installed_dir.is_dir() {
                    doomed.push(installed_dir);
                }
            }
        }

        let db = &mut self.db;
        db.bundles
            .get_mut(id)
            .release(Locality::LOCAL | Locality::INSTALLED, &mut db.plists);

        let removed = if locality.contains(Locality::PRISTINE) {
            // The factory slot may still hold the installed manifest. It
            // stays hidden until a restore reloads the shipped one.
            let entry = &mut db.bundles.get_mut(id).entry;
            if let Some(local) = entry.local_ref.take() {
                db.plists.delete(local);
            }
            entry.locality = Locality::PRISTINE | Locality::DISABLED;
            entry.modified = false;
            false
        } else {
            let entry = &mut db.bundles.get_mut(id).entry;
            if locality.contains(Locality::INSTALLED) {
                if let Some(installed) = entry.pristine_ref.take() {
                    db.plists.delete(installed);
                }
                entry.locality.remove(Locality::INSTALLED);
            }
            if dir_name.is_empty() {
                db.bundles.drop_locality(id, Locality::SOURCES, &mut db.plists);
            } else {
                let local_dir = self.config.local_bundles_dir().join(&dir_name);
                db.bundles.remove(id, &local_dir, &mut db.plists)?;
            }
            true
        };

        if !doomed.is_empty() {
            self.file_actions.push(file_action::delete_dirs(doomed));
        }
        self.mark_dirty();
        Ok(removed)
    }

    /// Re-enables a shipped bundle hidden by
    /// [`delete_bundle`](Self::delete_bundle), reading it fresh from disk.
    /// Returns false if the shipped bundle has no readable manifest.
    pub fn restore_bundle(&mut self, id: usize) -> Result<bool, CatalogError> {
        let locality = self.db.bundles.locality(id);
        if !locality.contains(Locality::PRISTINE | Locality::DISABLED) {
            return Err(CatalogError::invalid_state(format!(
                "bundle {} is not a disabled shipped bundle",
                id
            )));
        }

        let bundle_dir = self.config.pristine_bundles_dir().join(&self.db.bundles.get(id).dir_name);
        let path = bundle_dir.join(MANIFEST);
        if !path.is_file() {
            log::warn!("Cannot restore {}: no manifest", bundle_dir.display());
            return Ok(false);
        }
        let manifest = match self.db.plists.load(&path) {
            Ok(manifest) => manifest,
            Err(e) => {
                log::warn!("Cannot restore {}: {}", bundle_dir.display(), e);
                return Ok(false);
            }
        };

        let db = &mut self.db;
        db.bundles.get_mut(id).entry.locality = Locality::PRISTINE;
        db.bundles.register_update(id, manifest, Locality::PRISTINE, &mut db.plists);
        self.update_bundle_subdirs(&bundle_dir, Locality::PRISTINE, id, UpdateMode::Full);
        self.mark_dirty();
        Ok(true)
    }

    /// Directory of the version a bundle is read from: installed, then
    /// shipped, then local.
    pub fn bundle_path(&self, id: usize) -> PathBuf {
        let bundle = self.db.bundles.get(id);
        let locality = bundle.entry.locality;
        if locality.intersects(Locality::FACTORY) {
            self.factory_bundle_dir(locality, &bundle.dir_name)
        } else {
            self.local_bundle_dir(&bundle.dir_name)
        }
    }

    /// The bundle's `Support` directory, preferring the local one.
    pub fn bundle_support_path(&self, id: usize) -> Option<PathBuf> {
        let bundle = self.db.bundles.get(id);
        let locality = bundle.entry.locality;
        if bundle.dir_name.is_empty() {
            return None;
        }
        if locality.contains(Locality::LOCAL) {
            let local = self.local_bundle_dir(&bundle.dir_name).join(SUPPORT_DIR);
            if local.is_dir() {
                return Some(local);
            }
        }
        let factory = self.factory_bundle_dir(locality, &bundle.dir_name).join(SUPPORT_DIR);
        factory.is_dir().then_some(factory)
    }

    /// Timestamp of the shipped or installed manifest.
    pub fn bundle_mod_date(&self, id: usize) -> Option<i64> {
        let bundle = self.db.bundles.get(id);
        if !bundle.entry.locality.intersects(Locality::FACTORY) {
            return None;
        }
        let path = self.factory_bundle_dir(bundle.entry.locality, &bundle.dir_name).join(MANIFEST);
        file_mod_time(&path).ok()
    }

    /// Every bundle with a shipped or installed version.
    pub fn installed_bundles_info(&self) -> Vec<BundleInfo> {
        self.db
            .bundles
            .iter()
            .filter(|(_, bundle)| bundle.entry.locality.intersects(Locality::FACTORY))
            .map(|(id, bundle)| {
                let disabled = bundle.entry.locality.intersects(Locality::DISABLED | Locality::DELETED);
                BundleInfo {
                    id,
                    dir_name: bundle.dir_name.clone(),
                    uuid: bundle.entry.uuid.clone(),
                    disabled,
                    mod_date: if disabled { 0 } else { self.bundle_mod_date(id).unwrap_or(0) },
                }
            })
            .collect()
    }

    /// Variables a bundle's snippets and commands run with.
    pub fn bundle_environment(&self, id: usize) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        if let Some(support) = self.bundle_support_path(id) {
            env.insert("TM_BUNDLE_SUPPORT".to_owned(), support.to_string_lossy().into_owned());
        }
        env
    }

    /// The syntax associated with a file extension.
    pub fn syntax_for_extension(&self, ext: &str) -> Option<&str> {
        self.db.syntax_assocs.get(ext).map(String::as_str)
    }

    pub fn set_syntax_for_extension(&mut self, ext: &str, syntax: &str) {
        self.db.syntax_assocs.insert(ext.to_owned(), syntax.to_owned());
        self.mark_dirty();
    }
}
