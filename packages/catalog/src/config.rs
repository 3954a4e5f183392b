use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

fn default_commit_interval() -> u64 {
    5
}

/// Where the catalog finds its bundles and keeps its snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Holds the shipped `Bundles/` and `Themes/`.
    pub app_path: PathBuf,
    /// Holds local `Bundles/` and `Themes/`, `InstalledBundles/` and the
    /// catalog snapshot.
    pub app_data_path: PathBuf,
    #[serde(default)]
    pub rebuild_db: bool,
    #[serde(default = "default_commit_interval")]
    pub commit_interval_secs: u64,
}

impl CatalogConfig {
    pub fn new(app_path: impl Into<PathBuf>, app_data_path: impl Into<PathBuf>) -> Self {
        CatalogConfig {
            app_path: app_path.into(),
            app_data_path: app_data_path.into(),
            rebuild_db: false,
            commit_interval_secs: default_commit_interval(),
        }
    }

    /// Uses the platform data directory for per-user data.
    pub fn with_default_data_dir(app_path: impl Into<PathBuf>) -> Option<Self> {
        let data = dirs::data_dir()?.join("bundlestore");
        Some(Self::new(app_path, data))
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        log::debug!("Reading config {}", path.display());
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn pristine_bundles_dir(&self) -> PathBuf {
        self.app_path.join("Bundles")
    }

    pub fn pristine_themes_dir(&self) -> PathBuf {
        self.app_path.join("Themes")
    }

    pub fn installed_bundles_dir(&self) -> PathBuf {
        self.app_data_path.join("InstalledBundles")
    }

    pub fn local_bundles_dir(&self) -> PathBuf {
        self.app_data_path.join("Bundles")
    }

    pub fn local_themes_dir(&self) -> PathBuf {
        self.app_data_path.join("Themes")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.app_data_path.join("catalog.json")
    }
}
