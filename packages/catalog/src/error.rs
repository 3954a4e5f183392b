use std::io;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("Plist error: {0}")]
    Plist(#[from] bundlestore_plist::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Catalog snapshot error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{what} has no local version to save")]
    NotEditable { what: String },

    #[error("Invalid catalog state: {message}")]
    InvalidState { message: String },

    #[error("Bundle has no manifest at {}", path.display())]
    MissingManifest { path: PathBuf },
}

impl CatalogError {
    pub(crate) fn not_editable(what: impl Into<String>) -> Self {
        CatalogError::NotEditable { what: what.into() }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        CatalogError::InvalidState {
            message: message.into(),
        }
    }
}
