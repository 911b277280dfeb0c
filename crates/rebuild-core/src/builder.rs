use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use log::{debug, info, warn};
use rebuild_platform::write_atomic;
use serde::Serialize;

use crate::archive::write_zip;
use crate::capture::Capturer;
use crate::catalog::Catalog;
use crate::copy::{move_path, remove_path};
use crate::error::BackupError;
use crate::manifest::{
    ENV_VARS_FILE, MANIFEST_FILE, Manifest, ToolManifestEntry, format_created_at,
    format_timestamp, normalize_backup_name,
};
use crate::types::{DetectedTool, EnvVar};

pub const REASON_NO_CONFIGURATION: &str = "No backup configuration defined";
pub const REASON_NOTHING_CAPTURED: &str = "No items could be backed up (paths may not exist)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTool {
    pub tool: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCapture {
    pub tool: String,
    pub path: String,
    pub error: String,
}

/// Per-tool audit trail of a backup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupResults {
    pub success: Vec<String>,
    pub failed: Vec<FailedCapture>,
    pub skipped: Vec<SkippedTool>,
}

#[derive(Debug, Clone)]
pub struct BackupOutcome {
    /// Final location: the backup directory, or the archive when zipped.
    pub location: PathBuf,
    pub is_archived: bool,
    pub manifest: Manifest,
    pub results: BackupResults,
}

/// Captures the selected tools into a staged directory and publishes it under
/// the backup root once everything, manifest last, is on disk.
pub struct BackupBuilder {
    catalog: Arc<Catalog>,
    capturer: Capturer,
    backup_root: PathBuf,
    staging_root: PathBuf,
    archive: bool,
}

impl BackupBuilder {
    pub fn new(
        catalog: Arc<Catalog>,
        capturer: Capturer,
        backup_root: impl Into<PathBuf>,
        staging_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            capturer,
            backup_root: backup_root.into(),
            staging_root: staging_root.into(),
            archive: false,
        }
    }

    #[must_use]
    pub fn archive(mut self, archive: bool) -> Self {
        self.archive = archive;
        self
    }

    #[must_use]
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Back up `tools` and `env_vars` as one snapshot.
    ///
    /// Individual capture problems end up in [`BackupOutcome::results`]; only
    /// failures to stage, write the manifest, or publish the backup are
    /// returned as errors.
    ///
    /// # Errors
    /// Returns an error when the backup cannot be staged or published.
    pub async fn create_backup(
        &self,
        tools: &[DetectedTool],
        env_vars: &[EnvVar],
        backup_name: Option<&str>,
    ) -> Result<BackupOutcome, BackupError> {
        let now = Local::now();
        let timestamp = format_timestamp(&now);
        let name = match backup_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(custom) => normalize_backup_name(custom),
            None => format!("backup_{timestamp}"),
        };
        if name.contains(['/', '\\', ':']) || name.contains("..") {
            return Err(BackupError::InvalidName { name });
        }

        std::fs::create_dir_all(&self.staging_root).map_err(|error| {
            BackupError::io("failed to create staging directory", &self.staging_root, error)
        })?;
        let staging = tempfile::Builder::new()
            .prefix("backup-")
            .tempdir_in(&self.staging_root)
            .map_err(|error| {
                BackupError::io("failed to create staging directory", &self.staging_root, error)
            })?;
        let staged = staging.path().join(&name);
        std::fs::create_dir_all(&staged)
            .map_err(|error| BackupError::io("failed to create staging directory", &staged, error))?;

        let location = if self.archive {
            self.backup_root.join(format!("{name}.zip"))
        } else {
            self.backup_root.join(&name)
        };

        info!("Creating backup {name} with {} tools", tools.len());
        let mut results = BackupResults::default();
        let mut entries = Vec::new();

        for tool in tools {
            let Some(catalog_entry) = self.catalog.lookup(&tool.name) else {
                debug!("No catalog entry for {}", tool.name);
                results.skipped.push(SkippedTool {
                    tool: tool.name.clone(),
                    reason: REASON_NO_CONFIGURATION.to_string(),
                });
                continue;
            };

            let tool_folder = staged.join(&catalog_entry.internal_name);
            let mut entry = ToolManifestEntry {
                name: tool.name.clone(),
                version: tool.version.clone(),
                install_path: tool.path.clone(),
                backed_up_items: Vec::new(),
            };

            for spec in &catalog_entry.artifacts {
                match self.capturer.capture(spec, &tool_folder).await {
                    Ok(Some(mut artifact)) => {
                        artifact.destination = relative_destination(&staged, &artifact.destination);
                        entry.backed_up_items.push(artifact);
                    }
                    Ok(None) => {}
                    Err(error) => {
                        warn!("Failed to back up {} for {}: {error}", spec.source, tool.name);
                        results.failed.push(FailedCapture {
                            tool: tool.name.clone(),
                            path: spec.source.clone(),
                            error: error.to_string(),
                        });
                    }
                }
            }

            if entry.backed_up_items.is_empty() {
                let _ = std::fs::remove_dir(&tool_folder);
                results.skipped.push(SkippedTool {
                    tool: tool.name.clone(),
                    reason: REASON_NOTHING_CAPTURED.to_string(),
                });
            } else {
                results.success.push(tool.name.clone());
            }
            entries.push(entry);
        }

        let manifest = Manifest {
            backup_name: name.clone(),
            timestamp,
            created_at: format_created_at(&now),
            tools: entries,
            environment_variables: env_vars.to_vec(),
            storage_path: location.display().to_string(),
        };

        if !env_vars.is_empty() {
            let data = serde_json::to_vec_pretty(env_vars).map_err(|source| {
                BackupError::Serialize {
                    what: "environment variables",
                    source,
                }
            })?;
            let path = staged.join(ENV_VARS_FILE);
            write_atomic(&path, &data)
                .map_err(|error| BackupError::io("failed to write environment variables", &path, error))?;
        }

        let data = manifest.to_pretty_json().map_err(|source| BackupError::Serialize {
            what: "manifest",
            source,
        })?;
        let manifest_path = staged.join(MANIFEST_FILE);
        write_atomic(&manifest_path, &data)
            .map_err(|error| BackupError::io("failed to write manifest", &manifest_path, error))?;

        self.publish(&staged, &location, &name)?;

        info!(
            "Backup {name} complete: {} succeeded, {} failed, {} skipped",
            results.success.len(),
            results.failed.len(),
            results.skipped.len()
        );

        Ok(BackupOutcome {
            location,
            is_archived: self.archive,
            manifest,
            results,
        })
    }

    fn publish(&self, staged: &Path, location: &Path, name: &str) -> Result<(), BackupError> {
        std::fs::create_dir_all(&self.backup_root).map_err(|error| {
            BackupError::io("failed to create backup root", &self.backup_root, error)
        })?;

        let source = if self.archive {
            let zip_path = staged.with_file_name(format!("{name}.zip"));
            write_zip(staged, &zip_path, name).map_err(|error| BackupError::Archive {
                path: zip_path.clone(),
                details: error.to_string(),
            })?;
            zip_path
        } else {
            staged.to_path_buf()
        };

        replace_published(&source, location, &self.backup_root)
    }
}

/// Move `source` to `location`. A previous backup at `location` is set aside
/// first and only deleted once the new one is in place; it is put back when
/// the move fails.
fn replace_published(source: &Path, location: &Path, root: &Path) -> Result<(), BackupError> {
    let previous = if location.exists() {
        debug!("Replacing existing backup at {}", location.display());
        let aside = tempfile::Builder::new()
            .prefix(".previous-")
            .tempdir_in(root)
            .map_err(|error| BackupError::io("failed to set previous backup aside", root, error))?;
        let target = aside.path().join("backup");
        std::fs::rename(location, &target).map_err(|error| {
            BackupError::io("failed to set previous backup aside", location, error)
        })?;
        Some((aside, target))
    } else {
        None
    };

    match move_path(source, location) {
        Ok(()) => Ok(()),
        Err(error) => {
            let _ = remove_path(location);
            if let Some((_aside, target)) = &previous
                && let Err(restore_error) = std::fs::rename(target, location)
            {
                warn!(
                    "Could not put previous backup back at {}: {restore_error}",
                    location.display()
                );
            }
            Err(BackupError::io("failed to move backup into place", location, error))
        }
    }
}

/// Record destinations relative to the backup directory so the backup can be
/// moved or extracted anywhere.
fn relative_destination(backup_dir: &Path, destination: &str) -> String {
    let path = Path::new(destination);
    path.strip_prefix(backup_dir).map_or_else(
        |_| destination.to_string(),
        |relative| relative.display().to_string(),
    )
}

impl BackupResults {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{relative_destination, replace_published};

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("directory should be readable")
            .map(|entry| {
                entry
                    .expect("entry should be readable")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }

    #[test]
    fn destinations_are_made_relative_to_the_backup() {
        let backup = Path::new("staging").join("backup_1");
        let destination = backup.join("vscode").join("User");

        assert_eq!(
            relative_destination(&backup, &destination.display().to_string()),
            Path::new("vscode").join("User").display().to_string()
        );
        assert_eq!(relative_destination(&backup, "code CLI"), "code CLI");
    }

    #[test]
    fn failed_publish_keeps_previous_backup() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let root = temp_dir.path();
        let location = root.join("backup_1");
        std::fs::create_dir_all(&location).expect("previous backup should be created");
        std::fs::write(location.join("backup-info.json"), "old").expect("manifest should be written");

        let result = replace_published(&root.join("missing"), &location, root);

        assert!(result.is_err());
        assert_eq!(entries(root), vec!["backup_1"]);
        assert_eq!(
            std::fs::read_to_string(location.join("backup-info.json"))
                .expect("previous manifest should survive"),
            "old"
        );
    }

    #[test]
    fn publish_replaces_previous_backup_without_leftovers() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let root = temp_dir.path();
        let location = root.join("backup_1");
        std::fs::create_dir_all(&location).expect("previous backup should be created");
        std::fs::write(location.join("backup-info.json"), "old").expect("manifest should be written");
        let staged = temp_dir.path().join("staged");
        std::fs::create_dir_all(&staged).expect("staged backup should be created");
        std::fs::write(staged.join("backup-info.json"), "new").expect("manifest should be written");

        replace_published(&staged, &location, root).expect("publish should succeed");

        assert_eq!(entries(root), vec!["backup_1"]);
        assert_eq!(
            std::fs::read_to_string(location.join("backup-info.json"))
                .expect("new manifest should be readable"),
            "new"
        );
    }
}
