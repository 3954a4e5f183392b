//! Filesystem work that runs off the caller's thread, and recursive copies.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use walkdir::WalkDir;

/// Removes the directories on a background thread. Failures are logged.
pub(crate) fn delete_dirs(dirs: Vec<PathBuf>) -> JoinHandle<()> {
    thread::spawn(move || {
        for dir in dirs {
            match fs::remove_dir_all(&dir) {
                Ok(()) => log::debug!("Removed {}", dir.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Could not remove {}: {}", dir.display(), e),
            }
        }
    })
}

/// Copies the tree under `src` into `dst`, creating directories as needed.
pub(crate) fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    log::debug!("Copied {} to {}", src.display(), dst.display());
    Ok(())
}
