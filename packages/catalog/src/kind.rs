//! The six kinds of bundle item and their on-disk conventions.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    Language,
    Command,
    Snippet,
    DragCommand,
    Preference,
    Macro,
}

pub(crate) struct KindInfo {
    pub dir: &'static str,
    pub ext: &'static str,
    pub affects_parsing: bool,
}

const KINDS: [KindInfo; 6] = [
    KindInfo {
        dir: "Syntaxes",
        ext: ".tmLanguage",
        affects_parsing: true,
    },
    KindInfo {
        dir: "Commands",
        ext: ".tmCommand",
        affects_parsing: false,
    },
    KindInfo {
        dir: "Snippets",
        ext: ".tmSnippet",
        affects_parsing: false,
    },
    KindInfo {
        dir: "DragCommands",
        ext: ".tmDragCommand",
        affects_parsing: false,
    },
    KindInfo {
        dir: "Preferences",
        ext: ".tmPreferences",
        affects_parsing: true,
    },
    KindInfo {
        dir: "Macros",
        ext: ".tmMacro",
        affects_parsing: false,
    },
];

impl ItemKind {
    pub const ALL: [ItemKind; 6] = [
        ItemKind::Language,
        ItemKind::Command,
        ItemKind::Snippet,
        ItemKind::DragCommand,
        ItemKind::Preference,
        ItemKind::Macro,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    fn info(self) -> &'static KindInfo {
        &KINDS[self.index()]
    }

    /// Sub-directory of a bundle holding items of this kind.
    pub fn dir_name(self) -> &'static str {
        self.info().dir
    }

    /// Canonical file extension, with the leading dot.
    pub fn extension(self) -> &'static str {
        self.info().ext
    }

    pub fn from_dir_name(dir: &str) -> Option<ItemKind> {
        ItemKind::ALL.into_iter().find(|kind| kind.dir_name() == dir)
    }

    /// What the host has to reload after an item of this kind is deleted.
    pub fn reload_scope(self) -> ReloadScope {
        if self.info().affects_parsing {
            ReloadScope::Full
        } else {
            ReloadScope::None
        }
    }

    /// Whether a filename belongs to this kind (`.plist` or the kind's own
    /// extension, ignoring case).
    pub fn matches_file(self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        lower.ends_with(".plist") || lower.ends_with(&self.extension().to_lowercase())
    }
}

/// Reload a host must perform after a deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadScope {
    None,
    /// Grammars or preferences changed, so every open document has to be
    /// re-scoped.
    Full,
}

#[cfg(test)]
mod kind_tests {
    use super::*;

    #[test]
    fn dir_names_map_back_to_kinds() {
        for kind in ItemKind::ALL {
            assert_eq!(ItemKind::from_dir_name(kind.dir_name()), Some(kind));
        }
        assert_eq!(ItemKind::from_dir_name("Support"), None);
    }

    #[test]
    fn only_grammars_and_preferences_need_a_full_reload() {
        let full: Vec<ItemKind> = ItemKind::ALL
            .into_iter()
            .filter(|kind| kind.reload_scope() == ReloadScope::Full)
            .collect();
        assert_eq!(full, vec![ItemKind::Language, ItemKind::Preference]);
    }

    #[test]
    fn file_matching_ignores_case() {
        assert!(ItemKind::Snippet.matches_file("Hi.TMSNIPPET"));
        assert!(ItemKind::Snippet.matches_file("legacy.plist"));
        assert!(!ItemKind::Snippet.matches_file("Hi.tmCommand"));
        assert!(!ItemKind::Language.matches_file("README"));
    }
}
