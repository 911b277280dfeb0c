use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use rebuild_platform::{CommandError, CommandRunner, PathExpander};
use serde::Serialize;

use crate::catalog::Catalog;
use crate::copy::{copy_file, copy_tree, remove_path};
use crate::manifest::ToolManifestEntry;
use crate::migrate::{MigrationOutcome, migrate_sqldeveloper};
use crate::resolve::pattern_to_path;
use crate::timeouts::Timeouts;
use crate::types::{ArtifactKind, CapturedArtifact, ToolCapabilities};

const SQL_DEVELOPER_SETTINGS: &str = r"%APPDATA%\SQL Developer";

/// What happened to each item of one tool's restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

impl RestoreReport {
    /// False as soon as any single item failed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    fn extend(&mut self, other: Self) {
        self.restored.extend(other.restored);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
    }
}

/// Copies backed-up artifacts back to where they were captured from and runs
/// the post-restore hooks of tools that have them.
pub struct RestoreEngine {
    catalog: Arc<Catalog>,
    runner: Arc<dyn CommandRunner>,
    timeouts: Timeouts,
    sqldeveloper_root: PathBuf,
}

impl RestoreEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        runner: Arc<dyn CommandRunner>,
        expander: &PathExpander,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            catalog,
            runner,
            timeouts,
            sqldeveloper_root: pattern_to_path(&expander.expand(SQL_DEVELOPER_SETTINGS)),
        }
    }

    #[must_use]
    pub fn with_sqldeveloper_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sqldeveloper_root = root.into();
        self
    }

    /// Restore one tool from the backup laid out in `working_dir`.
    ///
    /// `recorded_location` is the backup location stored in the manifest; it
    /// lets absolute destinations written by older versions be found again
    /// after the backup moved.
    pub async fn restore(
        &self,
        entry: &ToolManifestEntry,
        working_dir: &Path,
        recorded_location: Option<&Path>,
    ) -> RestoreReport {
        let catalog_entry = self.catalog.lookup(&entry.name);
        let slug = catalog_entry.map_or_else(|| slug_for(&entry.name), |e| e.internal_name.clone());
        let capabilities = catalog_entry.map(|e| e.capabilities).unwrap_or_default();

        info!("Restoring {} ({} items)", entry.name, entry.backed_up_items.len());
        let mut report = RestoreReport::default();

        for item in &entry.backed_up_items {
            if item.source.is_empty() || item.destination.is_empty() {
                continue;
            }
            let copy = locate_backup_copy(item, working_dir, recorded_location, &slug);
            match item.kind {
                ArtifactKind::File => restore_file(item, &copy, &mut report),
                ArtifactKind::Folder => restore_folder(item, &copy, &mut report),
                ArtifactKind::Registry => self.restore_registry(&copy, &mut report).await,
                ArtifactKind::ExtensionList | ArtifactKind::PluginList | ArtifactKind::PackageList => {}
                ArtifactKind::Unknown => report
                    .skipped
                    .push(format!("Unsupported item type: {}", item.destination)),
            }
        }

        report.extend(self.run_hooks(capabilities, &slug, working_dir).await);

        if report.success() {
            info!("Restored {}: {} items", entry.name, report.restored.len());
        } else {
            warn!("Restore of {} had {} failures", entry.name, report.failed.len());
        }
        report
    }

    async fn restore_registry(&self, copy: &Path, report: &mut RestoreReport) {
        let name = file_name(copy);
        if !copy.is_file() {
            report
                .skipped
                .push(format!("Registry file not found: {}", copy.display()));
            return;
        }

        let path = copy.to_string_lossy();
        match self
            .runner
            .run("reg", &["import", &*path], self.timeouts.registry)
            .await
        {
            Ok(output) if output.success() => report.restored.push(format!("Registry: {name}")),
            Ok(output) => report.failed.push(format!(
                "Failed to import registry: {}",
                output.stderr.trim()
            )),
            Err(error) => report
                .failed
                .push(format!("Failed to import registry: {error}")),
        }
    }

    async fn run_hooks(
        &self,
        capabilities: ToolCapabilities,
        slug: &str,
        working_dir: &Path,
    ) -> RestoreReport {
        let mut report = RestoreReport::default();
        let tool_dir = working_dir.join(slug);

        if let Some(cli) = capabilities.extension_cli {
            report.extend(self.reinstall_extensions(cli, slug, &tool_dir).await);
        }
        if capabilities.plugin_list {
            report.extend(inventory_report(&tool_dir.join("plugins.txt"), "plugins"));
        }
        if capabilities.package_list {
            report.extend(inventory_report(&tool_dir.join("packages.txt"), "packages"));
        }
        if capabilities.settings_migration {
            match migrate_sqldeveloper(&self.sqldeveloper_root) {
                Ok(MigrationOutcome::Migrated { from, to, folders }) => report.restored.push(format!(
                    "Migrated {folders} settings folders from {} to {}",
                    file_name(&from),
                    file_name(&to)
                )),
                Ok(outcome) => debug!("SQL Developer migration: {outcome:?}"),
                Err(error) => report
                    .failed
                    .push(format!("SQL Developer settings migration: {error}")),
            }
        }
        report
    }

    async fn reinstall_extensions(&self, cli: &str, slug: &str, tool_dir: &Path) -> RestoreReport {
        let mut report = RestoreReport::default();
        let list = tool_dir.join("extensions.txt");
        let extensions = match read_list(&list) {
            Ok(Some(extensions)) => extensions,
            Ok(None) => {
                report
                    .skipped
                    .push(format!("No {slug}/extensions.txt found in backup"));
                return report;
            }
            Err(error) => {
                report
                    .failed
                    .push(format!("Error reading extensions list: {error}"));
                return report;
            }
        };
        if extensions.is_empty() {
            report.skipped.push("No extensions in backup".to_string());
            return report;
        }

        let available = self
            .runner
            .run(cli, &["--version"], self.timeouts.cli_check)
            .await
            .is_ok_and(|output| output.success());
        if !available {
            report
                .skipped
                .push(format!("'{cli}' command not available in PATH"));
            return report;
        }

        for extension in &extensions {
            let result = self
                .runner
                .run(
                    cli,
                    &["--install-extension", extension, "--force"],
                    self.timeouts.extension_install,
                )
                .await;
            match result {
                Ok(output) if output.success() => {
                    debug!("Installed extension {extension}");
                    report.restored.push(format!("Extension: {extension}"));
                }
                Ok(output) => report
                    .failed
                    .push(format!("Extension {extension}: {}", output.stderr.trim())),
                Err(CommandError::Timeout { .. }) => report
                    .failed
                    .push(format!("Extension {extension}: Installation timeout")),
                Err(error) => report.failed.push(format!("Extension {extension}: {error}")),
            }
        }
        report
    }
}

fn restore_file(item: &CapturedArtifact, copy: &Path, report: &mut RestoreReport) {
    let target = Path::new(&item.source);
    let name = file_name(target);
    if !copy.is_file() {
        report
            .skipped
            .push(format!("Backup file not found: {}", copy.display()));
        return;
    }
    match copy_file(copy, target) {
        Ok(()) => report.restored.push(format!("File: {name}")),
        Err(error) => {
            warn!("Failed to restore {}: {error}", target.display());
            report.failed.push(format!("Failed to restore {name}: {error}"));
        }
    }
}

fn restore_folder(item: &CapturedArtifact, copy: &Path, report: &mut RestoreReport) {
    let target = Path::new(&item.source);
    let name = file_name(target);
    if !copy.is_dir() {
        report
            .skipped
            .push(format!("Backup folder not found: {}", copy.display()));
        return;
    }

    let result = remove_path(target).and_then(|()| copy_tree(copy, target, &[]));
    match result {
        Ok(stats) if stats.skipped == 0 => report.restored.push(format!("Directory: {name}")),
        Ok(stats) => report.failed.push(format!(
            "Failed to restore {name}: {} files could not be copied",
            stats.skipped
        )),
        Err(error) => {
            warn!("Failed to restore {}: {error}", target.display());
            report.failed.push(format!("Failed to restore {name}: {error}"));
        }
    }
}

/// Plugins and packages travel inside the restored config folders; the
/// inventory only confirms what came back.
fn inventory_report(list: &Path, noun: &str) -> RestoreReport {
    let mut report = RestoreReport::default();
    match read_list(list) {
        Ok(Some(items)) if !items.is_empty() => report.restored.push(format!(
            "{} restored with config ({} {noun})",
            capitalize(noun),
            items.len()
        )),
        Ok(Some(_)) => report.skipped.push(format!("No {noun} in backup")),
        Ok(None) => report.skipped.push(format!("No {noun}.txt found")),
        Err(error) => report
            .failed
            .push(format!("Error reading {noun} list: {error}")),
    }
    report
}

fn read_list(path: &Path) -> std::io::Result<Option<Vec<String>>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

/// Where the backed-up copy of `item` lives in the backup being restored.
fn locate_backup_copy(
    item: &CapturedArtifact,
    working_dir: &Path,
    recorded_location: Option<&Path>,
    slug: &str,
) -> PathBuf {
    let destination = pattern_to_path(&item.destination);
    if destination.is_relative() {
        return working_dir.join(destination);
    }
    if let Some(relative) = recorded_location.and_then(|root| destination.strip_prefix(root).ok()) {
        return working_dir.join(relative);
    }
    if destination.exists() {
        return destination;
    }
    match destination.file_name() {
        Some(name) => working_dir.join(slug).join(name),
        None => destination,
    }
}

fn slug_for(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
