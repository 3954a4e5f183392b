//! Synchronizing the catalog with the bundle and theme directories.

use std::path::Path;

use bundlestore_plist::{file_mod_time, save_plist, PlistRef, PlistTable};
use walkdir::WalkDir;

use super::BundleCatalog;
use crate::kind::ItemKind;
use crate::locality::{EntryTable, Locality, Tracked};

/// How much of the bundle tree an update walks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    Full,
    /// Manifests and grammars only, for a fast start.
    SyntaxOnly,
    /// Everything [`SyntaxOnly`](UpdateMode::SyntaxOnly) skips.
    Rest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStatus {
    MoreWork,
    Done,
}

const BUNDLE_EXT: &str = ".tmbundle";
const MANIFEST: &str = "info.plist";

fn has_extension(name: &str, ext: &str) -> bool {
    name.to_lowercase().ends_with(&ext.to_lowercase())
}

/// Sorted names of the direct children of `dir` accepted by `keep`.
fn list_dir(dir: &Path, dirs: bool, keep: impl Fn(&str) -> bool) -> Vec<String> {
    log::debug!("Scanning {}", dir.display());
    let mut names: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir() == dirs)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| keep(name))
        .collect();
    names.sort();
    names
}

/// Brings the `loc` versions in `table` in line with the files in `dir`:
/// vanished files are dropped first, then changed files reloaded, then new
/// files added.
pub(crate) fn update_plists<T: Tracked>(
    table: &mut EntryTable<T>,
    plists: &mut PlistTable,
    dir: &Path,
    loc: Locality,
    ext: &str,
) {
    if !dir.is_dir() {
        table.drop_vanished(loc, plists);
        return;
    }
    let mut files = list_dir(dir, false, |name| has_extension(name, ".plist") || has_extension(name, ext));

    // The file a row's `loc` version lives in, and whether that file is
    // left alone: an unsaved local version has no file yet, and an installed
    // version shadows the pristine file.
    let tracked = |table: &EntryTable<T>, plists: &PlistTable, id: usize| -> Option<(PlistRef, String, bool)> {
        let entry = table.entry(id);
        if !entry.locality.contains(loc) {
            return None;
        }
        let shadowed = loc == Locality::PRISTINE && entry.locality.contains(Locality::INSTALLED);
        let skip = shadowed || (loc == Locality::LOCAL && entry.has_unsaved_local(plists));
        let plist = entry.ref_for(loc)?;
        let filename = match &entry.shadowed_file {
            Some(file) if shadowed => file.clone(),
            _ => plists.get(plist).filename().to_owned(),
        };
        Some((plist, filename, skip))
    };

    let mut id = 0;
    while id < table.len() {
        if let Some((_, filename, skip)) = tracked(&*table, &*plists, id) {
            let present = files.iter().any(|f| *f == filename);
            if !present && !skip {
                log::debug!("{} vanished from {}", filename, dir.display());
                table.drop_locality(id, loc, plists);
            }
        }
        id += 1;
    }

    let mut id = 0;
    while id < table.len() {
        if let Some((plist, filename, skip)) = tracked(&*table, &*plists, id) {
            if let Some(pos) = files.iter().position(|f| *f == filename) {
                files.remove(pos);
                let path = dir.join(&filename);
                let changed = match file_mod_time(&path) {
                    Ok(secs) => secs != plists.get(plist).mod_time(),
                    Err(_) => true,
                };
                if changed && !skip {
                    match plists.load(&path) {
                        Ok(fresh) => table.register_update(id, fresh, loc, plists),
                        Err(e) => {
                            log::warn!("Skipping {}: {}", path.display(), e);
                            table.drop_locality(id, loc, plists);
                        }
                    }
                }
            }
        }
        id += 1;
    }

    for filename in files {
        let path = dir.join(&filename);
        let plist = match plists.load(&path) {
            Ok(plist) => plist,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let uuid = plists.get(plist).root().get_string("uuid").map(str::to_owned);
        match uuid.and_then(|uuid| table.find_uuid(&uuid)) {
            Some(id) => {
                log::debug!("{} matches an existing entry by uuid", path.display());
                table.register_update(id, plist, loc, plists);
            }
            None => {
                table.insert(plist, loc, plists);
            }
        }
    }
}

impl BundleCatalog {
    /// Synchronizes the catalog with the theme and bundle directories.
    /// `SyntaxOnly` followed by `Rest` ends in the same state as `Full`.
    pub fn update(&mut self, mode: UpdateMode) {
        if mode != UpdateMode::Rest {
            let db = &mut self.db;
            let pristine = self.config.pristine_themes_dir();
            update_plists(&mut db.themes, &mut db.plists, &pristine, Locality::PRISTINE, ".tmTheme");
            let local = self.config.local_themes_dir();
            update_plists(&mut db.themes, &mut db.plists, &local, Locality::LOCAL, ".tmTheme");
        }

        let installed = self.config.installed_bundles_dir();
        self.update_bundles(&installed, Locality::INSTALLED, mode);
        let pristine = self.config.pristine_bundles_dir();
        self.update_bundles(&pristine, Locality::PRISTINE, mode);
        let local = self.config.local_bundles_dir();
        self.update_bundles(&local, Locality::LOCAL, mode);

        if mode != UpdateMode::SyntaxOnly {
            self.all_bundles_updated = true;
            self.next_phase = None;
        }
        self.mark_dirty();
    }

    /// Runs the next pending scan phase.
    pub fn resume_scan(&mut self) -> ScanStatus {
        match self.next_phase.take() {
            Some(UpdateMode::SyntaxOnly) => {
                self.update(UpdateMode::SyntaxOnly);
                self.next_phase = Some(UpdateMode::Rest);
                ScanStatus::MoreWork
            }
            Some(mode) => {
                self.update(mode);
                ScanStatus::Done
            }
            None => ScanStatus::Done,
        }
    }

    pub fn all_bundles_updated(&self) -> bool {
        self.all_bundles_updated
    }

    fn update_bundles(&mut self, root: &Path, loc: Locality, mode: UpdateMode) {
        if !root.is_dir() {
            let db = &mut self.db;
            db.bundles.drop_vanished(loc, &mut db.plists);
            return;
        }
        let mut dirs = list_dir(root, true, |name| has_extension(name, BUNDLE_EXT));

        let mut id = 0;
        while id < self.db.bundles.len() {
            let entry = self.db.bundles.entry(id);
            let locality = entry.locality;
            if !locality.contains(loc) {
                id += 1;
                continue;
            }
            let dir_name = self.db.bundles.get(id).dir_name.clone();
            let Some(pos) = dirs.iter().position(|d| *d == dir_name) else {
                let unsaved = loc == Locality::LOCAL && entry.has_unsaved_local(&self.db.plists);
                if !unsaved {
                    log::debug!("Bundle {} vanished from {}", dir_name, root.display());
                    let db = &mut self.db;
                    db.bundles.drop_locality(id, loc, &mut db.plists);
                }
                id += 1;
                continue;
            };
            dirs.remove(pos);

            if locality.intersects(Locality::DISABLED | Locality::DELETED)
                || (loc == Locality::PRISTINE && locality.contains(Locality::INSTALLED))
            {
                id += 1;
                continue;
            }

            let bundle_dir = root.join(&dir_name);
            if mode != UpdateMode::Rest && !self.update_manifest(id, &bundle_dir, loc) {
                id += 1;
                continue;
            }
            self.update_bundle_subdirs(&bundle_dir, loc, id, mode);
            id += 1;
        }

        for dir_name in dirs {
            let existing = self.db.bundles.iter().position(|(_, b)| {
                !b.entry.is_tombstone() && b.dir_name == dir_name
            });
            if let Some(id) = existing {
                if loc == Locality::PRISTINE && self.db.bundles.locality(id).contains(Locality::INSTALLED) {
                    continue;
                }
            }
            if mode == UpdateMode::Rest {
                continue;
            }

            let bundle_dir = root.join(&dir_name);
            let Some(manifest) = self.read_new_manifest(&bundle_dir, &dir_name, loc, existing) else {
                continue;
            };
            let id = match existing {
                Some(id) => {
                    let db = &mut self.db;
                    db.bundles.register_update(id, manifest, loc, &mut db.plists);
                    id
                }
                None => {
                    let id = self.db.bundles.insert(manifest, loc, &self.db.plists);
                    self.db.bundles.get_mut(id).dir_name = dir_name.clone();
                    id
                }
            };
            self.update_bundle_subdirs(&bundle_dir, loc, id, mode);
        }
    }

    /// Reloads a known bundle's manifest if it changed. Returns false if the
    /// bundle lost this locality.
    fn update_manifest(&mut self, id: usize, bundle_dir: &Path, loc: Locality) -> bool {
        let path = bundle_dir.join(MANIFEST);
        let db = &mut self.db;
        if path.is_file() {
            let Some(current) = db.bundles.entry(id).ref_for(loc) else {
                return true;
            };
            let changed = match file_mod_time(&path) {
                Ok(secs) => secs != db.plists.get(current).mod_time(),
                Err(_) => true,
            };
            if changed {
                match db.plists.load(&path) {
                    Ok(fresh) => db.bundles.register_update(id, fresh, loc, &mut db.plists),
                    Err(e) => {
                        log::warn!("Skipping bundle {}: {}", bundle_dir.display(), e);
                        db.bundles.drop_locality(id, loc, &mut db.plists);
                        return false;
                    }
                }
            }
            true
        } else if loc == Locality::LOCAL {
            let entry = db.bundles.entry(id);
            let manifest = match (entry.locality.intersects(Locality::FACTORY), entry.pristine_ref) {
                (true, Some(factory)) => db.plists.copy(factory),
                _ => db.plists.create(&bundle_display_name(bundle_dir), Some(MANIFEST)),
            };
            db.plists.get_mut(manifest).set_filename(MANIFEST);
            if let Err(e) = save_plist(db.plists.get_mut(manifest), bundle_dir) {
                log::warn!("Could not write manifest into {}: {}", bundle_dir.display(), e);
            }
            db.bundles.register_update(id, manifest, loc, &mut db.plists);
            true
        } else {
            // A factory bundle is not valid without a manifest.
            log::debug!("Bundle {} has no manifest", bundle_dir.display());
            db.bundles.drop_locality(id, loc, &mut db.plists);
            false
        }
    }

    fn read_new_manifest(
        &mut self,
        bundle_dir: &Path,
        dir_name: &str,
        loc: Locality,
        existing: Option<usize>,
    ) -> Option<PlistRef> {
        let path = bundle_dir.join(MANIFEST);
        let db = &mut self.db;
        if path.is_file() {
            match db.plists.load(&path) {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    log::warn!("Skipping bundle {}: {}", bundle_dir.display(), e);
                    None
                }
            }
        } else if loc == Locality::LOCAL {
            let factory = existing.and_then(|id| {
                let entry = db.bundles.entry(id);
                entry
                    .locality
                    .intersects(Locality::FACTORY)
                    .then_some(entry.pristine_ref)
                    .flatten()
            });
            let manifest = match factory {
                Some(factory) => db.plists.copy(factory),
                None => db.plists.create(&bundle_display_name(Path::new(dir_name)), Some(MANIFEST)),
            };
            db.plists.get_mut(manifest).set_filename(MANIFEST);
            if let Err(e) = save_plist(db.plists.get_mut(manifest), bundle_dir) {
                log::warn!("Could not write manifest into {}: {}", bundle_dir.display(), e);
            }
            Some(manifest)
        } else {
            None
        }
    }

    pub(crate) fn update_bundle_subdirs(&mut self, bundle_dir: &Path, loc: Locality, id: usize, mode: UpdateMode) {
        let db = &mut self.db;
        for kind in ItemKind::ALL {
            let wanted = match kind {
                ItemKind::Language => mode != UpdateMode::Rest,
                _ => mode != UpdateMode::SyntaxOnly,
            };
            if !wanted {
                continue;
            }
            let table = db.bundles.get_mut(id).items_mut(kind);
            update_plists(
                table,
                &mut db.plists,
                &bundle_dir.join(kind.dir_name()),
                loc,
                kind.extension(),
            );
        }
    }
}

/// `Name.tmbundle` becomes `Name`.
fn bundle_display_name(bundle_dir: &Path) -> String {
    let dir_name = bundle_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match dir_name.rfind('.') {
        Some(dot) => dir_name[..dot].to_owned(),
        None => dir_name,
    }
}

#[cfg(test)]
mod scan_tests {
    use std::fs;

    use bundlestore_plist::Plist;

    use super::*;
    use crate::locality::CatalogEntry;

    fn write_item(dir: &Path, filename: &str, name: &str, uuid: &str) {
        let mut plist = Plist::create(name);
        plist.root_mut().set_string("uuid", uuid);
        plist.set_filename(filename);
        save_plist(&mut plist, dir).unwrap();
    }

    #[test]
    fn detects_new_changed_and_vanished_files() {
        let dir = tempfile::tempdir().unwrap();
        write_item(dir.path(), "a.tmSnippet", "A", "UA");
        write_item(dir.path(), "b.plist", "B", "UB");
        write_item(dir.path(), "ignored.tmCommand", "C", "UC");

        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();
        update_plists(&mut table, &mut plists, dir.path(), Locality::PRISTINE, ".tmSnippet");
        assert_eq!(table.visible_ids().len(), 2);
        let a = table.find_uuid("UA").unwrap();

        write_item(dir.path(), "a.tmSnippet", "A2", "UA");
        let file = fs::File::options().write(true).open(dir.path().join("a.tmSnippet")).unwrap();
        file.set_modified(std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000))
            .unwrap();
        fs::remove_file(dir.path().join("b.plist")).unwrap();

        update_plists(&mut table, &mut plists, dir.path(), Locality::PRISTINE, ".tmSnippet");
        assert_eq!(table.find_uuid("UA"), Some(a));
        assert_eq!(table.entry(a).name, "A2");
        assert_eq!(table.find_uuid("UB"), None);
        assert_eq!(plists.live_count(), 1);
    }

    #[test]
    fn corrupt_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_item(dir.path(), "good.tmSnippet", "Good", "UG");
        fs::write(dir.path().join("bad.tmSnippet"), "<plist><dict><real>1</real></dict></plist>").unwrap();

        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();
        update_plists(&mut table, &mut plists, dir.path(), Locality::LOCAL, ".tmSnippet");
        assert_eq!(table.len(), 1);
        assert_eq!(table.entry(0).name, "Good");
        assert_eq!(plists.live_count(), 1);
    }

    #[test]
    fn new_file_with_a_known_uuid_joins_the_entry() {
        let shipped = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        write_item(shipped.path(), "x.tmSnippet", "Shipped", "SAME");
        write_item(user.path(), "x.tmSnippet", "Edited", "SAME");

        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();
        update_plists(&mut table, &mut plists, shipped.path(), Locality::PRISTINE, ".tmSnippet");
        update_plists(&mut table, &mut plists, user.path(), Locality::LOCAL, ".tmSnippet");
        assert_eq!(table.len(), 1);
        assert_eq!(table.locality(0), Locality::PRISTINE | Locality::LOCAL);
        let effective = table.resolve(0).unwrap();
        assert_eq!(plists.get(effective).root().get_string("name"), Some("Edited"));
    }

    #[test]
    fn shadowed_pristine_file_is_not_reparsed() {
        let installed = tempfile::tempdir().unwrap();
        let shipped = tempfile::tempdir().unwrap();
        write_item(installed.path(), "a.tmSnippet", "Installed", "S-ONE");
        write_item(shipped.path(), "b.tmSnippet", "Shipped", "S-ONE");

        let mut plists = PlistTable::new();
        let mut table: EntryTable<CatalogEntry> = EntryTable::new();
        update_plists(&mut table, &mut plists, installed.path(), Locality::INSTALLED, ".tmSnippet");
        update_plists(&mut table, &mut plists, shipped.path(), Locality::PRISTINE, ".tmSnippet");
        assert_eq!(table.visible_ids().len(), 1);
        assert_eq!(table.locality(0), Locality::INSTALLED | Locality::PRISTINE);
        assert_eq!(table.entry(0).shadowed_file.as_deref(), Some("b.tmSnippet"));
        assert_eq!(plists.live_count(), 1);

        write_item(shipped.path(), "b.tmSnippet", "Shipped", "S-TWO");
        let file = fs::File::options().write(true).open(shipped.path().join("b.tmSnippet")).unwrap();
        file.set_modified(std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000))
            .unwrap();

        update_plists(&mut table, &mut plists, shipped.path(), Locality::PRISTINE, ".tmSnippet");
        assert_eq!(table.visible_ids().len(), 1);
        assert_eq!(table.find_uuid("S-TWO"), None);
        assert_eq!(table.entry(0).name, "Installed");
        assert_eq!(plists.live_count(), 1);
    }

    #[test]
    fn display_name_drops_the_extension() {
        assert_eq!(bundle_display_name(Path::new("/x/My.Bundle.tmbundle")), "My.Bundle");
        assert_eq!(bundle_display_name(Path::new("plain")), "plain");
    }
}
