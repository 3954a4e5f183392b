use std::fs;
use std::path::Path;

use super::BundleCatalog;
use crate::error::CatalogError;
use crate::file_action::copy_dir_all;
use crate::kind::ItemKind;
use crate::locality::Locality;

impl BundleCatalog {
    /// Writes the effective version of a bundle into `dst`: the manifest,
    /// every visible item under its kind directory, and the support
    /// directory. Stops at the first failure, leaving what was copied so far.
    pub fn export_bundle(&self, dst: &Path, bundle: usize) -> Result<(), CatalogError> {
        fs::create_dir_all(dst)?;

        let row = self.db.bundles.get(bundle);
        let Some(manifest) = row.entry.resolve() else {
            return Err(CatalogError::invalid_state(format!("bundle {} is disabled", bundle)));
        };
        let manifest_dir = if row.entry.locality.contains(Locality::LOCAL) {
            self.local_bundle_dir(&row.dir_name)
        } else {
            self.factory_bundle_dir(row.entry.locality, &row.dir_name)
        };
        let manifest_path = manifest_dir.join(self.db.plists.get(manifest).filename());
        if !manifest_path.is_file() {
            return Err(CatalogError::MissingManifest { path: manifest_path });
        }
        fs::copy(&manifest_path, dst.join("info.plist"))?;

        for kind in ItemKind::ALL {
            let items = self.list(kind, bundle);
            if items.is_empty() {
                continue;
            }
            let kind_dir = dst.join(kind.dir_name());
            fs::create_dir_all(&kind_dir)?;
            for item in items {
                let Some(src) = self.bundle_item_path(kind, bundle, item) else {
                    continue;
                };
                if let Some(filename) = src.file_name() {
                    self.export_bundle_item(&kind_dir.join(filename), kind, bundle, item)?;
                }
            }
        }

        if let Some(support) = self.bundle_support_path(bundle) {
            copy_dir_all(&support, &dst.join("Support"))?;
        }
        log::debug!("Exported bundle {} to {}", row.dir_name, dst.display());
        Ok(())
    }

    /// Copies the effective file of one item to `dst`.
    pub fn export_bundle_item(
        &self,
        dst: &Path,
        kind: ItemKind,
        bundle: usize,
        item: usize,
    ) -> Result<(), CatalogError> {
        let src = self.bundle_item_path(kind, bundle, item).ok_or_else(|| {
            CatalogError::invalid_state(format!("{:?} {} in bundle {} is disabled", kind, item, bundle))
        })?;
        fs::copy(&src, dst)?;
        Ok(())
    }
}
