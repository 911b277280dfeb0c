use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rebuild_core::Timeouts;
use rebuild_platform::AppPaths;

const DETECT_SCRIPT_FILE: &str = "detect-tools.ps1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Where backups are published. Defaults to OneDrive or Documents.
    #[serde(default)]
    pub backup_root: Option<PathBuf>,

    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    #[serde(default)]
    pub extract_dir: Option<PathBuf>,

    /// Replaces the embedded tool catalog.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    #[serde(default)]
    pub detect_script: Option<PathBuf>,

    #[serde(default)]
    pub archive_backups: bool,

    #[serde(default = "default_true")]
    pub open_browser_for_manual: bool,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_detection_cache_ttl")]
    pub detection_cache_ttl_minutes: u64,

    #[serde(default = "default_post_install_settle")]
    pub post_install_settle_secs: u64,

    #[serde(default = "default_registry_timeout")]
    pub registry_timeout_secs: u64,

    #[serde(default = "default_cli_timeout")]
    pub cli_timeout_secs: u64,

    #[serde(default = "default_cli_check_timeout")]
    pub cli_check_timeout_secs: u64,

    #[serde(default = "default_extension_install_timeout")]
    pub extension_install_timeout_secs: u64,

    #[serde(default = "default_package_query_timeout")]
    pub package_query_timeout_secs: u64,

    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,

    #[serde(default = "default_detect_timeout")]
    pub detect_timeout_secs: u64,

    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_detection_cache_ttl() -> u64 {
    60
}

fn default_post_install_settle() -> u64 {
    2
}

fn default_registry_timeout() -> u64 {
    30
}

fn default_cli_timeout() -> u64 {
    30
}

fn default_cli_check_timeout() -> u64 {
    10
}

fn default_extension_install_timeout() -> u64 {
    60
}

fn default_package_query_timeout() -> u64 {
    30
}

fn default_install_timeout() -> u64 {
    600
}

fn default_detect_timeout() -> u64 {
    60
}

fn default_download_timeout() -> u64 {
    900
}

fn default_http_timeout() -> u64 {
    30
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backup_root: None,
            staging_dir: None,
            extract_dir: None,
            catalog_path: None,
            detect_script: None,
            archive_backups: false,
            open_browser_for_manual: true,
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            detection_cache_ttl_minutes: default_detection_cache_ttl(),
            post_install_settle_secs: default_post_install_settle(),
            registry_timeout_secs: default_registry_timeout(),
            cli_timeout_secs: default_cli_timeout(),
            cli_check_timeout_secs: default_cli_check_timeout(),
            extension_install_timeout_secs: default_extension_install_timeout(),
            package_query_timeout_secs: default_package_query_timeout(),
            install_timeout_secs: default_install_timeout(),
            detect_timeout_secs: default_detect_timeout(),
            download_timeout_secs: default_download_timeout(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl AppSettings {
    pub fn load(paths: &AppPaths) -> Self {
        Self::load_from(&paths.settings_file())
    }

    fn load_from(settings_path: &Path) -> Self {
        if !settings_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(settings_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                log::warn!(
                    "Ignoring unreadable settings {}: {error}",
                    settings_path.display()
                );
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, paths: &AppPaths) -> Result<(), std::io::Error> {
        paths.ensure_dirs()?;
        self.save_to(&paths.settings_file())
    }

    fn save_to(&self, settings_path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(settings_path, content)?;
        Ok(())
    }

    pub fn backup_root(&self, paths: &AppPaths) -> PathBuf {
        self.backup_root
            .clone()
            .unwrap_or_else(|| paths.default_backup_root())
    }

    pub fn staging_dir(&self, paths: &AppPaths) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| paths.staging_dir())
    }

    pub fn extract_dir(&self, paths: &AppPaths) -> PathBuf {
        self.extract_dir
            .clone()
            .unwrap_or_else(|| paths.extract_dir())
    }

    pub fn detect_script(&self, paths: &AppPaths) -> PathBuf {
        self.detect_script
            .clone()
            .unwrap_or_else(|| paths.config_dir.join(DETECT_SCRIPT_FILE))
    }

    pub fn detection_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.detection_cache_ttl_minutes.saturating_mul(60))
    }

    pub fn post_install_settle(&self) -> Duration {
        Duration::from_secs(self.post_install_settle_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            registry: Duration::from_secs(self.registry_timeout_secs),
            cli: Duration::from_secs(self.cli_timeout_secs),
            cli_check: Duration::from_secs(self.cli_check_timeout_secs),
            extension_install: Duration::from_secs(self.extension_install_timeout_secs),
            package_query: Duration::from_secs(self.package_query_timeout_secs),
            install: Duration::from_secs(self.install_timeout_secs),
            detect: Duration::from_secs(self.detect_timeout_secs),
            download: Duration::from_secs(self.download_timeout_secs),
            ..Timeouts::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use rebuild_platform::AppPaths;
    use serde_json::json;

    use super::AppSettings;

    fn test_paths(root: &std::path::Path) -> AppPaths {
        AppPaths {
            config_dir: root.join("config"),
            cache_dir: root.join("cache"),
            data_dir: root.join("data"),
            home_dir: root.join("home"),
        }
    }

    #[test]
    fn app_settings_defaults_match_expected_timeouts() {
        let settings = AppSettings::default();
        assert_eq!(settings.registry_timeout_secs, 30);
        assert_eq!(settings.cli_timeout_secs, 30);
        assert_eq!(settings.cli_check_timeout_secs, 10);
        assert_eq!(settings.extension_install_timeout_secs, 60);
        assert_eq!(settings.package_query_timeout_secs, 30);
        assert_eq!(settings.install_timeout_secs, 600);
        assert_eq!(settings.detect_timeout_secs, 60);
        assert_eq!(settings.http_timeout_secs, 30);
        assert_eq!(settings.max_log_size_bytes, 5 * 1024 * 1024);
        assert!(settings.open_browser_for_manual);
        assert!(!settings.archive_backups);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: AppSettings =
            serde_json::from_value(json!({ "archive_backups": true, "install_timeout_secs": 5 }))
                .expect("partial settings JSON should deserialize");

        assert!(settings.archive_backups);
        assert_eq!(settings.install_timeout_secs, 5);
        assert_eq!(settings.cli_timeout_secs, 30);
        assert!(settings.open_browser_for_manual);
    }

    #[test]
    fn unparsable_settings_file_loads_defaults() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").expect("settings file should be written");

        let settings = AppSettings::load_from(&path);

        assert_eq!(settings.detection_cache_ttl_minutes, 60);
        assert!(settings.backup_root.is_none());
    }

    #[test]
    fn save_and_load_preserve_overrides() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = test_paths(temp_dir.path());
        let settings = AppSettings {
            backup_root: Some(PathBuf::from("D:/Backups")),
            post_install_settle_secs: 0,
            ..AppSettings::default()
        };

        settings.save(&paths).expect("settings should be saved");
        let loaded = AppSettings::load(&paths);

        assert_eq!(loaded.backup_root, Some(PathBuf::from("D:/Backups")));
        assert_eq!(loaded.post_install_settle_secs, 0);
    }

    #[test]
    fn timeouts_follow_settings() {
        let settings = AppSettings {
            install_timeout_secs: 42,
            cli_check_timeout_secs: 3,
            ..AppSettings::default()
        };

        let timeouts = settings.timeouts();

        assert_eq!(timeouts.install, Duration::from_secs(42));
        assert_eq!(timeouts.cli_check, Duration::from_secs(3));
        assert_eq!(timeouts.env_write, rebuild_core::Timeouts::default().env_write);
    }

    #[test]
    fn unset_paths_resolve_under_app_directories() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = test_paths(temp_dir.path());
        let settings = AppSettings::default();

        assert_eq!(settings.staging_dir(&paths), paths.staging_dir());
        assert_eq!(settings.extract_dir(&paths), paths.extract_dir());
        assert!(settings.detect_script(&paths).starts_with(&paths.config_dir));
    }
}
