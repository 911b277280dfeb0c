use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use rebuild_platform::{CommandRunner, PathExpander};

use crate::copy::{SKIP_FOLDERS, copy_file, copy_tree, path_size, remove_path};
use crate::error::CaptureError;
use crate::resolve::{resolve_all, resolve_first};
use crate::timeouts::Timeouts;
use crate::types::{ArtifactKind, ArtifactSpec, CapturedArtifact};

/// Copies single artifacts into a backup tree.
///
/// Absence is never an error: a path that does not exist, a file that is
/// locked, a registry key that fails to export or a CLI that is not installed
/// all produce `Ok(None)`.
pub struct Capturer {
    expander: PathExpander,
    runner: Arc<dyn CommandRunner>,
    timeouts: Timeouts,
}

impl Capturer {
    pub fn new(expander: PathExpander, runner: Arc<dyn CommandRunner>, timeouts: Timeouts) -> Self {
        Self {
            expander,
            runner,
            timeouts,
        }
    }

    #[must_use]
    pub fn expander(&self) -> &PathExpander {
        &self.expander
    }

    /// Capture `spec` into `dest_folder`, creating it when something is found.
    ///
    /// # Errors
    /// Returns an error only for unexpected failures writing into the backup
    /// tree.
    pub async fn capture(
        &self,
        spec: &ArtifactSpec,
        dest_folder: &Path,
    ) -> Result<Option<CapturedArtifact>, CaptureError> {
        match spec.kind {
            ArtifactKind::File | ArtifactKind::Folder => self.capture_path(spec, dest_folder),
            ArtifactKind::Registry => self.capture_registry(spec, dest_folder).await,
            ArtifactKind::ExtensionList => self.capture_extensions(spec, dest_folder).await,
            ArtifactKind::PluginList | ArtifactKind::PackageList => {
                self.capture_inventory(spec, dest_folder)
            }
            ArtifactKind::Unknown => {
                debug!("Ignoring artifact of unknown kind: {}", spec.source);
                Ok(None)
            }
        }
    }

    fn capture_path(
        &self,
        spec: &ArtifactSpec,
        dest_folder: &Path,
    ) -> Result<Option<CapturedArtifact>, CaptureError> {
        let expanded = self.expander.expand(&spec.source);
        let Some(source) = resolve_first(&expanded) else {
            debug!("Nothing to capture at {expanded}");
            return Ok(None);
        };

        std::fs::create_dir_all(dest_folder)
            .map_err(|error| CaptureError::io(dest_folder, &error))?;
        let name = source
            .file_name()
            .map_or_else(|| OsString::from("item"), ToOwned::to_owned);
        let dest = unique_destination(dest_folder, &name);

        let kind = if source.is_dir() {
            let stats = copy_tree(&source, &dest, SKIP_FOLDERS)
                .map_err(|error| CaptureError::io(&dest, &error))?;
            if stats.copied == 0 && stats.skipped > 0 {
                warn!(
                    "All {} files in {} were locked or unreadable",
                    stats.skipped,
                    source.display()
                );
                let _ = remove_path(&dest);
                return Ok(None);
            }
            ArtifactKind::Folder
        } else {
            if let Err(error) = copy_file(&source, &dest) {
                warn!("Skipping locked file {}: {error}", source.display());
                return Ok(None);
            }
            ArtifactKind::File
        };

        info!("Captured {} ({})", source.display(), spec.description);
        Ok(Some(CapturedArtifact {
            description: spec.description.clone(),
            source: source.display().to_string(),
            destination: dest.display().to_string(),
            kind,
            size_bytes: Some(path_size(&dest)),
            count: None,
        }))
    }

    async fn capture_registry(
        &self,
        spec: &ArtifactSpec,
        dest_folder: &Path,
    ) -> Result<Option<CapturedArtifact>, CaptureError> {
        let key = self.expander.expand(spec.source.trim());
        std::fs::create_dir_all(dest_folder)
            .map_err(|error| CaptureError::io(dest_folder, &error))?;
        let dest = dest_folder.join(registry_file_name(&key));
        let dest_arg = dest.to_string_lossy().into_owned();

        match self
            .runner
            .run(
                "reg",
                &["export", &key, &dest_arg, "/y"],
                self.timeouts.registry,
            )
            .await
        {
            Ok(output) if output.success() && dest.is_file() => {
                info!("Exported registry key {key}");
                Ok(Some(CapturedArtifact {
                    description: spec.description.clone(),
                    source: key,
                    destination: dest.display().to_string(),
                    kind: ArtifactKind::Registry,
                    size_bytes: Some(path_size(&dest)),
                    count: None,
                }))
            }
            Ok(output) => {
                debug!(
                    "reg export {key} exited with {:?}: {}",
                    output.code,
                    output.stderr.trim()
                );
                Ok(None)
            }
            Err(error) => {
                warn!("Could not export registry key {key}: {error}");
                Ok(None)
            }
        }
    }

    async fn capture_extensions(
        &self,
        spec: &ArtifactSpec,
        dest_folder: &Path,
    ) -> Result<Option<CapturedArtifact>, CaptureError> {
        let command = spec.source.trim();
        let output = match self
            .runner
            .run(command, &["--list-extensions"], self.timeouts.cli)
            .await
        {
            Ok(output) if output.success() => output,
            Ok(output) => {
                debug!("{command} --list-extensions failed: {}", output.stderr.trim());
                return Ok(None);
            }
            Err(error) => {
                debug!("Cannot list extensions with {command}: {error}");
                return Ok(None);
            }
        };

        let extensions: Vec<&str> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if extensions.is_empty() {
            return Ok(None);
        }

        let dest = write_inventory(dest_folder, ArtifactKind::ExtensionList, &extensions)?;
        info!("Captured {} extensions via {command}", extensions.len());
        Ok(Some(CapturedArtifact {
            description: spec.description.clone(),
            source: format!("{command} CLI"),
            destination: dest.display().to_string(),
            kind: ArtifactKind::ExtensionList,
            size_bytes: None,
            count: Some(extensions.len()),
        }))
    }

    fn capture_inventory(
        &self,
        spec: &ArtifactSpec,
        dest_folder: &Path,
    ) -> Result<Option<CapturedArtifact>, CaptureError> {
        let mut names = BTreeSet::new();
        let mut scanned = Vec::new();

        for pattern in spec.source.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            for dir in resolve_all(&self.expander.expand(pattern)) {
                let Ok(entries) = std::fs::read_dir(&dir) else {
                    continue;
                };
                for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
                    let name = match spec.kind {
                        ArtifactKind::PluginList if path.is_dir() => path.file_name(),
                        ArtifactKind::PackageList if path.is_file() => path.file_stem(),
                        _ => None,
                    };
                    if let Some(name) = name {
                        names.insert(name.to_string_lossy().into_owned());
                    }
                }
                scanned.push(dir);
            }
        }

        if names.is_empty() {
            return Ok(None);
        }

        let listed: Vec<&str> = names.iter().map(String::as_str).collect();
        let dest = write_inventory(dest_folder, spec.kind, &listed)?;
        let source = match (spec.kind, scanned.first()) {
            (ArtifactKind::PackageList, Some(dir)) => dir.display().to_string(),
            _ => "Plugin directories".to_string(),
        };

        Ok(Some(CapturedArtifact {
            description: spec.description.clone(),
            source,
            destination: dest.display().to_string(),
            kind: spec.kind,
            size_bytes: None,
            count: Some(names.len()),
        }))
    }
}

fn write_inventory(
    dest_folder: &Path,
    kind: ArtifactKind,
    lines: &[&str],
) -> Result<PathBuf, CaptureError> {
    let file_name = kind.inventory_file_name().unwrap_or("inventory.txt");
    std::fs::create_dir_all(dest_folder).map_err(|error| CaptureError::io(dest_folder, &error))?;
    let dest = dest_folder.join(file_name);
    std::fs::write(&dest, lines.join("\n")).map_err(|error| CaptureError::io(&dest, &error))?;
    Ok(dest)
}

/// `name` inside `folder`, numbered when a sibling artifact already took it.
fn unique_destination(folder: &Path, name: &std::ffi::OsStr) -> PathBuf {
    let first = folder.join(name);
    if !first.exists() {
        return first;
    }

    let base = name.to_string_lossy();
    (2..)
        .map(|n| folder.join(format!("{base} ({n})")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// File name for a registry export: hive prefixes shortened, separators and
/// characters Windows rejects in file names replaced by underscores.
#[must_use]
pub fn registry_file_name(key: &str) -> String {
    let shortened = key
        .replace("HKEY_CURRENT_USER\\", "HKCU_")
        .replace("HKEY_LOCAL_MACHINE\\", "HKLM_");
    let sanitized: String = shortened
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    format!("{sanitized}.reg")
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use rebuild_platform::testing::ScriptedRunner;
    use rebuild_platform::{CommandOutput, PathExpander};

    use super::{Capturer, registry_file_name};
    use crate::timeouts::Timeouts;
    use crate::types::{ArtifactKind, ArtifactSpec};

    fn spec(source: &str, kind: ArtifactKind) -> ArtifactSpec {
        ArtifactSpec {
            source: source.to_string(),
            kind,
            description: "test".to_string(),
        }
    }

    fn capturer(root: &Path, runner: ScriptedRunner) -> Capturer {
        let expander = PathExpander::from_vars([("APPDATA", root.display().to_string())]);
        Capturer::new(expander, Arc::new(runner), Timeouts::default())
    }

    #[test]
    fn registry_file_name_shortens_hives() {
        assert_eq!(
            registry_file_name("HKEY_CURRENT_USER\\Software\\SimonTatham\\PuTTY"),
            "HKCU_Software_SimonTatham_PuTTY.reg"
        );
        assert_eq!(
            registry_file_name("HKEY_LOCAL_MACHINE\\SOFTWARE\\Git"),
            "HKLM_SOFTWARE_Git.reg"
        );
        assert_eq!(
            registry_file_name("HKEY_CURRENT_USER\\Software\\Classes\\*\\shell\\VSCode"),
            "HKCU_Software_Classes___shell_VSCode.reg"
        );
    }

    #[tokio::test]
    async fn missing_source_captures_nothing() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let capturer = capturer(temp.path(), ScriptedRunner::new());
        let dest = temp.path().join("backup").join("tool");

        let result = capturer
            .capture(&spec("%APPDATA%\\Nope\\settings.json", ArtifactKind::File), &dest)
            .await
            .expect("capture should not error");

        assert!(result.is_none());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn file_capture_records_size_and_source() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        std::fs::create_dir_all(temp.path().join("pip")).expect("dir should be created");
        std::fs::write(temp.path().join("pip").join("pip.ini"), "[global]\n")
            .expect("file should be written");
        let capturer = capturer(temp.path(), ScriptedRunner::new());
        let dest = temp.path().join("backup").join("python");

        let artifact = capturer
            .capture(&spec("%APPDATA%\\pip\\pip.ini", ArtifactKind::File), &dest)
            .await
            .expect("capture should not error")
            .expect("file should be captured");

        assert_eq!(artifact.kind, ArtifactKind::File);
        assert_eq!(artifact.size_bytes, Some(9));
        assert!(dest.join("pip.ini").is_file());
    }

    #[tokio::test]
    async fn folders_with_the_same_name_do_not_overwrite_each_other() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        for parent in ["docs", "roaming"] {
            let dir = temp.path().join(parent).join("MobaXterm");
            std::fs::create_dir_all(&dir).expect("dir should be created");
            std::fs::write(dir.join("MobaXterm.ini"), parent).expect("file should be written");
        }
        let capturer = capturer(temp.path(), ScriptedRunner::new());
        let dest = temp.path().join("backup").join("mobaxterm");

        let first = capturer
            .capture(&spec("%APPDATA%\\docs\\MobaXterm", ArtifactKind::Folder), &dest)
            .await
            .expect("capture should not error")
            .expect("first folder should be captured");
        let second = capturer
            .capture(&spec("%APPDATA%\\roaming\\MobaXterm", ArtifactKind::Folder), &dest)
            .await
            .expect("capture should not error")
            .expect("second folder should be captured");

        assert_ne!(first.destination, second.destination);
        assert_eq!(
            std::fs::read_to_string(dest.join("MobaXterm").join("MobaXterm.ini"))
                .expect("first copy should exist"),
            "docs"
        );
        assert_eq!(
            std::fs::read_to_string(dest.join("MobaXterm (2)").join("MobaXterm.ini"))
                .expect("second copy should exist"),
            "roaming"
        );
    }

    #[tokio::test]
    async fn registry_capture_uses_reg_export_output() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let runner = ScriptedRunner::new().handle("reg", &["export"], |args| {
            std::fs::write(args[2], "Windows Registry Editor Version 5.00\r\n")
                .expect("export file should be written");
            Ok(CommandOutput::ok(""))
        });
        let capturer = capturer(temp.path(), runner);
        let dest = temp.path().join("backup").join("putty");

        let artifact = capturer
            .capture(
                &spec(
                    "HKEY_CURRENT_USER\\Software\\SimonTatham\\PuTTY",
                    ArtifactKind::Registry,
                ),
                &dest,
            )
            .await
            .expect("capture should not error")
            .expect("registry key should be captured");

        assert_eq!(artifact.kind, ArtifactKind::Registry);
        assert_eq!(artifact.source, "HKEY_CURRENT_USER\\Software\\SimonTatham\\PuTTY");
        assert!(dest.join("HKCU_Software_SimonTatham_PuTTY.reg").is_file());
    }

    #[tokio::test]
    async fn registry_capture_failure_is_silent() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let runner = ScriptedRunner::new().respond(
            "reg",
            &["export"],
            CommandOutput::failed(1, "ERROR: The system was unable to find the specified registry key"),
        );
        let capturer = capturer(temp.path(), runner);

        let result = capturer
            .capture(
                &spec("HKEY_CURRENT_USER\\Software\\Missing", ArtifactKind::Registry),
                &temp.path().join("backup"),
            )
            .await
            .expect("capture should not error");

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn extension_list_is_written_with_count() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let runner = ScriptedRunner::new().respond(
            "code",
            &["--list-extensions"],
            CommandOutput::ok("ms-python.python\n\nrust-lang.rust-analyzer\n"),
        );
        let capturer = capturer(temp.path(), runner);
        let dest = temp.path().join("backup").join("vscode");

        let artifact = capturer
            .capture(&spec("code", ArtifactKind::ExtensionList), &dest)
            .await
            .expect("capture should not error")
            .expect("extensions should be captured");

        assert_eq!(artifact.count, Some(2));
        assert_eq!(artifact.source, "code CLI");
        assert_eq!(
            std::fs::read_to_string(dest.join("extensions.txt")).expect("list should exist"),
            "ms-python.python\nrust-lang.rust-analyzer"
        );
    }

    #[tokio::test]
    async fn missing_cli_skips_extension_list() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let capturer = capturer(temp.path(), ScriptedRunner::new());

        let result = capturer
            .capture(&spec("code", ArtifactKind::ExtensionList), &temp.path().join("b"))
            .await
            .expect("capture should not error");

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn plugin_inventory_merges_all_matching_directories() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        for (version, plugin) in [("Rider2023.3", "IdeaVim"), ("Rider2024.1", "Rainbow")] {
            std::fs::create_dir_all(temp.path().join(version).join("plugins").join(plugin))
                .expect("plugin dir should be created");
        }
        std::fs::create_dir_all(temp.path().join("Rider2024.1").join("plugins").join("IdeaVim"))
            .expect("plugin dir should be created");
        let capturer = capturer(temp.path(), ScriptedRunner::new());
        let dest = temp.path().join("backup").join("rider");

        let artifact = capturer
            .capture(&spec("%APPDATA%\\Rider*\\plugins", ArtifactKind::PluginList), &dest)
            .await
            .expect("capture should not error")
            .expect("plugins should be captured");

        assert_eq!(artifact.count, Some(2));
        assert_eq!(
            std::fs::read_to_string(dest.join("plugins.txt")).expect("list should exist"),
            "IdeaVim\nRainbow"
        );
    }
}
