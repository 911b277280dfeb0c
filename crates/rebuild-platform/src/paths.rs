use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "rebuild";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppPathsError {
    #[error("Could not determine home directory")]
    HomeDirUnavailable,
    #[error("Could not determine config directory")]
    ConfigDirUnavailable,
    #[error("Could not determine cache directory")]
    CacheDirUnavailable,
    #[error("Could not determine data directory")]
    DataDirUnavailable,
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
    pub home_dir: PathBuf,
}

impl AppPaths {
    /// Build application paths for the current user.
    ///
    /// # Errors
    /// Returns an error when a required base directory cannot be determined.
    pub fn new() -> Result<Self, AppPathsError> {
        Ok(Self {
            config_dir: dirs::config_dir()
                .ok_or(AppPathsError::ConfigDirUnavailable)?
                .join(APP_DIR),
            cache_dir: dirs::cache_dir()
                .ok_or(AppPathsError::CacheDirUnavailable)?
                .join(APP_DIR),
            data_dir: dirs::data_dir()
                .ok_or(AppPathsError::DataDirUnavailable)?
                .join(APP_DIR),
            home_dir: dirs::home_dir().ok_or(AppPathsError::HomeDirUnavailable)?,
        })
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    #[must_use]
    pub fn detection_cache_file(&self) -> PathBuf {
        self.cache_dir.join("detected-tools.json")
    }

    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.cache_dir.join("staging")
    }

    #[must_use]
    pub fn extract_dir(&self) -> PathBuf {
        self.cache_dir.join("extracted")
    }

    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.cache_dir.join("downloads")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("debug.log")
    }

    #[must_use]
    pub fn operation_lock_file(&self) -> PathBuf {
        self.data_dir.join("operation.lock")
    }

    /// Default location for backups: a `Backup Folders/Rebuild` directory
    /// inside the user's OneDrive, or inside Documents when OneDrive is absent.
    #[must_use]
    pub fn default_backup_root(&self) -> PathBuf {
        resolve_backup_root(|name| std::env::var(name).ok(), &self.home_dir)
    }

    /// Ensure all application directories exist on disk.
    ///
    /// # Errors
    /// Returns an error if any directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

pub fn resolve_backup_root<F>(env: F, home: &Path) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let from_env = ["OneDriveCommercial", "OneDrive"]
        .into_iter()
        .filter_map(&env)
        .map(PathBuf::from)
        .find(|path| path.is_dir());

    let base = from_env
        .or_else(|| Some(home.join("OneDrive")).filter(|path| path.is_dir()))
        .unwrap_or_else(|| home.join("Documents"));

    base.join("Backup Folders").join("Rebuild")
}
