//! Collision-free file and directory names derived from display names.

use std::path::Path;

const ILLEGAL: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

fn sanitize(name: &str) -> String {
    let clean: String = name.chars().filter(|c| !ILLEGAL.contains(c)).collect();
    if clean.is_empty() {
        "New".to_owned()
    } else {
        clean
    }
}

/// A name in `dir` for `name` with extension `ext` (leading dot included)
/// that no existing file or directory uses. Used for item files, themes and
/// bundle directories alike.
pub fn make_valid_name(dir: &Path, name: &str, ext: &str) -> String {
    let base = sanitize(name);
    let mut candidate = format!("{}{}", base, ext);
    let mut n = 1;
    while dir.join(&candidate).exists() {
        candidate = format!("{}{}{}", base, n, ext);
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod names_tests {
    use std::fs;

    use super::*;

    #[test]
    fn illegal_characters_are_stripped() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            make_valid_name(dir.path(), "a/b:c*d?\"<e>|\\", ".tmSnippet"),
            "abcde.tmSnippet"
        );
        assert_eq!(make_valid_name(dir.path(), "???", ".tmTheme"), "New.tmTheme");
    }

    #[test]
    fn collisions_get_a_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Hi.tmSnippet"), "").unwrap();
        fs::write(dir.path().join("Hi1.tmSnippet"), "").unwrap();
        assert_eq!(make_valid_name(dir.path(), "Hi", ".tmSnippet"), "Hi2.tmSnippet");

        fs::create_dir(dir.path().join("Test.tmbundle")).unwrap();
        assert_eq!(make_valid_name(dir.path(), "Test", ".tmbundle"), "Test1.tmbundle");
    }

    #[test]
    fn files_and_directories_share_one_namespace() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Tools.tmbundle"), "").unwrap();
        assert_eq!(make_valid_name(dir.path(), "Tools", ".tmbundle"), "Tools1.tmbundle");
        fs::create_dir(dir.path().join("Dusk.tmTheme")).unwrap();
        assert_eq!(make_valid_name(dir.path(), "Dusk", ".tmTheme"), "Dusk1.tmTheme");
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn names_are_legal_and_unused(name in "\\PC{0,12}", taken in 0usize..3) {
            let dir = tempfile::tempdir().unwrap();
            for _ in 0..taken {
                let used = make_valid_name(dir.path(), &name, ".plist");
                std::fs::write(dir.path().join(used), "").unwrap();
            }
            let fresh = make_valid_name(dir.path(), &name, ".plist");
            prop_assert!(fresh.ends_with(".plist"));
            prop_assert!(!fresh.contains(ILLEGAL));
            prop_assert!(!dir.path().join(&fresh).exists());
        }
    }
}
