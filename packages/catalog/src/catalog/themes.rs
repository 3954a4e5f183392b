use bundlestore_plist::{save_plist, PlistDict, PlistDictMut};

use super::{BundleCatalog, ItemRef};
use crate::error::CatalogError;
use crate::locality::Locality;
use crate::names::make_valid_name;

const THEME_EXT: &str = ".tmTheme";

const DEFAULT_SETTINGS: [(&str, &str); 6] = [
    ("background", "#FFFFFF"),
    ("caret", "#000000"),
    ("foreground", "#000000"),
    ("invisibles", "#BFBFBF"),
    ("lineHighlight", "#00000012"),
    ("selection", "#C3DCFF"),
];

impl BundleCatalog {
    /// Visible themes ordered by name, ignoring case.
    pub fn themes(&self) -> Vec<ItemRef> {
        let mut themes: Vec<ItemRef> = self
            .db
            .themes
            .visible_ids()
            .into_iter()
            .map(|id| ItemRef {
                id,
                name: self.db.themes.entry(id).name.clone(),
            })
            .collect();
        themes.sort_by_key(|theme| theme.name.to_lowercase());
        themes
    }

    pub fn theme(&self, id: usize) -> Option<PlistDict<'_>> {
        self.dict(self.db.themes.resolve(id))
    }

    pub fn theme_from_uuid(&self, uuid: &str) -> Option<PlistDict<'_>> {
        let id = self.db.themes.find_uuid(uuid)?;
        self.theme(id)
    }

    pub fn is_theme_editable(&self, id: usize) -> bool {
        self.db.themes.entry(id).is_editable()
    }

    /// The local version of a theme, copied from the shipped one on first
    /// use.
    pub fn editable_theme(&mut self, id: usize) -> PlistDictMut<'_> {
        self.mark_dirty();
        let db = &mut self.db;
        let local = db.themes.resolve_editable(id, &mut db.plists);
        db.plists.get_mut(local).root_mut()
    }

    /// Queues the theme for writing on the next [`commit`](Self::commit).
    pub fn mark_theme_modified(&mut self, id: usize) {
        debug_assert!(self.is_theme_editable(id), "theme {} is not local", id);
        self.db.themes.get_mut(id).modified = true;
        self.mark_dirty();
    }

    /// Creates a local theme with default colors. It is written on the
    /// next commit.
    pub fn new_theme(&mut self, name: &str) -> usize {
        let filename = make_valid_name(&self.config.local_themes_dir(), name, THEME_EXT);
        let db = &mut self.db;
        let plist = db.plists.create(name, Some(&filename));
        {
            let mut root = db.plists.get_mut(plist).root_mut();
            let mut settings = root.new_array("settings");
            let mut general = settings.insert_dict(0);
            let mut colors = general.new_dict("settings");
            for (key, value) in DEFAULT_SETTINGS {
                colors.set_string(key, value);
            }
        }
        let id = db.themes.insert(plist, Locality::LOCAL, &db.plists);
        self.mark_theme_modified(id);
        id
    }

    pub fn save_theme(&mut self, id: usize) -> Result<(), CatalogError> {
        let entry = self.db.themes.entry(id);
        let local = match entry.local_ref {
            Some(local) if entry.is_editable() => local,
            _ => return Err(CatalogError::not_editable(format!("theme {}", id))),
        };
        save_plist(self.db.plists.get_mut(local), &self.config.local_themes_dir())?;
        self.db.themes.get_mut(id).modified = false;
        self.mark_dirty();
        Ok(())
    }

    /// Removes a local theme, or hides a shipped one.
    pub fn delete_theme(&mut self, id: usize) -> Result<(), CatalogError> {
        let dir = self.config.local_themes_dir();
        let db = &mut self.db;
        db.themes.remove(id, &dir, &mut db.plists)?;
        self.mark_dirty();
        Ok(())
    }

    /// Brings back a shipped theme hidden by [`delete_theme`](Self::delete_theme).
    pub fn restore_theme(&mut self, id: usize) -> bool {
        let restored = self.db.themes.restore(id);
        if restored {
            self.mark_dirty();
        }
        restored
    }
}
