use rebuild_core::{BackupError, CatalogError, DetectError, StoreError};
use rebuild_installer::InstallError;
use rebuild_platform::AppPathsError;
use thiserror::Error;

use crate::lock::AcquireError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Paths(#[from] AppPathsError),

    #[error(transparent)]
    Lock(#[from] AcquireError),

    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("detection: {0}")]
    Detect(#[from] DetectError),

    #[error("backup: {0}")]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("installer: {0}")]
    Install(#[from] InstallError),

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no backups found in {root}")]
    NoBackups { root: String },

    #[error("unknown tool(s): {}", .names.join(", "))]
    UnknownTools { names: Vec<String> },

    #[error("nothing selected to back up")]
    NothingSelected,
}

impl AppError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}
