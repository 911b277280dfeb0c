use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use rebuild_core::archive::extract_zip;
use rebuild_core::copy::{copy_tree, remove_path};
use rebuild_core::{DownloadSource, InstallPlan, Timeouts};
use rebuild_platform::{CommandError, CommandOutput, CommandRunner};

use crate::download::{Downloader, installer_file_name};
use crate::error::InstallError;

const WINGET_MISSING: &str = "winget not found - please install App Installer from Microsoft Store";
const CHOCOLATEY_URL: &str = "https://chocolatey.org";
/// Portable tool shipped as a zip and unpacked into the install directory.
const PORTABLE_TOOL_MARKER: &str = "sqldeveloper";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    AlreadyInstalled,
    /// A person has to finish the install, usually behind a vendor login.
    RequiresManual { url: Option<String> },
    Failed,
    /// The installer did not finish in time; it may still be running.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    pub tool: String,
    pub status: InstallStatus,
    pub message: String,
    pub output: Option<String>,
}

impl InstallResult {
    fn new(tool: &str, status: InstallStatus, message: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            status,
            message: message.into(),
            output: None,
        }
    }

    fn with_output(mut self, output: &CommandOutput) -> Self {
        self.output = Some(format!("{}{}", output.stdout, output.stderr));
        self
    }

    #[must_use]
    pub fn success(&self) -> bool {
        matches!(
            self.status,
            InstallStatus::Installed | InstallStatus::AlreadyInstalled
        )
    }

    #[must_use]
    pub fn requires_manual(&self) -> bool {
        matches!(self.status, InstallStatus::RequiresManual { .. })
    }
}

/// Installs missing tools through winget, Chocolatey or a downloaded
/// installer.
pub struct Installer {
    runner: Arc<dyn CommandRunner>,
    downloader: Arc<dyn Downloader>,
    downloads_dir: PathBuf,
    portable_dir: PathBuf,
    timeouts: Timeouts,
    open_browser: bool,
}

impl Installer {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        downloader: Arc<dyn Downloader>,
        downloads_dir: impl Into<PathBuf>,
        portable_dir: impl Into<PathBuf>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            runner,
            downloader,
            downloads_dir: downloads_dir.into(),
            portable_dir: portable_dir.into(),
            timeouts,
            open_browser: true,
        }
    }

    /// Open manual download pages in the browser.
    #[must_use]
    pub fn open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Short description of how `plan` would be installed.
    #[must_use]
    pub fn describe(plan: &InstallPlan) -> Option<String> {
        match (&plan.package_id, &plan.download) {
            (Some(id), _) => Some(format!("winget:{id}")),
            (None, Some(source)) => Some(source.describe()),
            (None, None) => None,
        }
    }

    /// Install `tool` using the first method in `plan`: the winget package if
    /// there is one, then the download source.
    pub async fn install(&self, tool: &str, plan: &InstallPlan) -> InstallResult {
        match (&plan.package_id, &plan.download) {
            (Some(id), _) => self.install_winget(tool, id).await,
            (None, Some(source)) => self.install_download(tool, source).await,
            (None, None) => InstallResult::new(
                tool,
                InstallStatus::RequiresManual { url: None },
                "Manual installation required",
            ),
        }
    }

    async fn install_winget(&self, tool: &str, id: &str) -> InstallResult {
        match self
            .runner
            .run(
                "winget",
                &["list", "--id", id, "--exact"],
                self.timeouts.package_query,
            )
            .await
        {
            Ok(output) if output.success() && output.stdout.contains(id) => {
                info!("{tool} is already installed ({id})");
                let mut result = InstallResult::new(
                    tool,
                    InstallStatus::AlreadyInstalled,
                    format!("{tool} is already installed"),
                );
                result.output = Some("Already installed - skipped installation".to_string());
                return result;
            }
            Ok(_) => {}
            Err(CommandError::NotFound { .. }) => {
                return InstallResult::new(tool, InstallStatus::Failed, WINGET_MISSING);
            }
            Err(error) => debug!("winget list {id} failed: {error}"),
        }

        info!("Installing {tool} via winget ({id})");
        let result = self
            .runner
            .run(
                "winget",
                &[
                    "install",
                    "--id",
                    id,
                    "--silent",
                    "--accept-package-agreements",
                    "--accept-source-agreements",
                    "--disable-interactivity",
                ],
                self.timeouts.install,
            )
            .await;

        match result {
            Ok(output) if output.success() => InstallResult::new(
                tool,
                InstallStatus::Installed,
                format!("{tool} installed successfully"),
            )
            .with_output(&output),
            Ok(output) => winget_failure(tool, &output).with_output(&output),
            Err(CommandError::NotFound { .. }) => {
                InstallResult::new(tool, InstallStatus::Failed, WINGET_MISSING)
            }
            Err(error @ CommandError::Timeout { .. }) => {
                warn!("{error}");
                InstallResult::new(
                    tool,
                    InstallStatus::TimedOut,
                    format!(
                        "Installation of {tool} timed out (exceeded {} minutes)",
                        self.timeouts.install.as_secs() / 60
                    ),
                )
            }
            Err(error) => InstallResult::new(
                tool,
                InstallStatus::Failed,
                format!("Error installing {tool}: {error}"),
            ),
        }
    }

    async fn install_download(&self, tool: &str, source: &DownloadSource) -> InstallResult {
        match source {
            DownloadSource::Manual { url, message } => {
                let opened = self.open_browser && open::that(url).is_ok();
                let message = if opened {
                    format!("{message} (Browser opened)")
                } else {
                    format!("{message}: {url}")
                };
                InstallResult::new(
                    tool,
                    InstallStatus::RequiresManual {
                        url: Some(url.clone()),
                    },
                    message,
                )
            }
            DownloadSource::Chocolatey { package } => self.install_chocolatey(tool, package).await,
            DownloadSource::Direct { url } => self.install_from_url(tool, url).await,
        }
    }

    async fn install_chocolatey(&self, tool: &str, package: &str) -> InstallResult {
        match self
            .runner
            .run("choco", &["--version"], self.timeouts.cli_check)
            .await
        {
            Ok(output) if output.success() => {}
            Ok(_) => {
                return InstallResult::new(
                    tool,
                    InstallStatus::Failed,
                    format!("Chocolatey not installed. Install from {CHOCOLATEY_URL}"),
                );
            }
            Err(CommandError::Timeout { .. }) => {
                return InstallResult::new(
                    tool,
                    InstallStatus::TimedOut,
                    format!("Installation of {tool} via Chocolatey timed out"),
                );
            }
            Err(_) => {
                return InstallResult::new(
                    tool,
                    InstallStatus::Failed,
                    format!("Chocolatey not found. Install from {CHOCOLATEY_URL}"),
                );
            }
        }

        info!("Installing {tool} via Chocolatey ({package})");
        match self
            .runner
            .run("choco", &["install", package, "-y"], self.timeouts.install)
            .await
        {
            Ok(output)
                if output.success()
                    || output.combined_lowercase().contains("successfully installed") =>
            {
                InstallResult::new(
                    tool,
                    InstallStatus::Installed,
                    format!("{tool} installed successfully via Chocolatey"),
                )
                .with_output(&output)
            }
            Ok(output) => {
                let stderr = output.stderr.trim();
                let details = if stderr.is_empty() {
                    "Installation failed"
                } else {
                    stderr
                };
                InstallResult::new(
                    tool,
                    InstallStatus::Failed,
                    format!("Failed to install {tool} via Chocolatey: {details}"),
                )
                .with_output(&output)
            }
            Err(CommandError::Timeout { .. }) => InstallResult::new(
                tool,
                InstallStatus::TimedOut,
                format!("Installation of {tool} via Chocolatey timed out"),
            ),
            Err(error) => InstallResult::new(
                tool,
                InstallStatus::Failed,
                format!("Error installing {tool} via Chocolatey: {error}"),
            ),
        }
    }

    async fn install_from_url(&self, tool: &str, url: &str) -> InstallResult {
        let file_name = installer_file_name(tool, url);
        let temp = match std::fs::create_dir_all(&self.downloads_dir)
            .and_then(|()| tempfile::tempdir_in(&self.downloads_dir))
        {
            Ok(temp) => temp,
            Err(error) => {
                return InstallResult::new(
                    tool,
                    InstallStatus::Failed,
                    format!("Error installing {tool}: {error}"),
                );
            }
        };
        let installer = temp.path().join(&file_name);

        let download = tokio::time::timeout(
            self.timeouts.download,
            self.downloader.download(url, &installer),
        )
        .await
        .unwrap_or_else(|_| {
            Err(InstallError::Timeout {
                url: url.to_string(),
                timeout: self.timeouts.download,
            })
        });
        if let Err(error) = download {
            warn!("Download of {tool} failed: {error}");
            let status = if error.is_timeout() {
                InstallStatus::TimedOut
            } else {
                InstallStatus::Failed
            };
            return InstallResult::new(tool, status, format!("Failed to download {tool}: {error}"));
        }

        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            return self.install_portable(tool, &installer, temp.path(), &lower);
        }

        let installer_arg = installer.to_string_lossy().into_owned();
        let result = if lower.ends_with(".msi") {
            self.runner
                .run(
                    "msiexec",
                    &["/i", &installer_arg, "/quiet", "/norestart"],
                    self.timeouts.install,
                )
                .await
        } else {
            self.runner
                .run(&installer_arg, silent_flags(tool), self.timeouts.install)
                .await
        };

        match result {
            Ok(output) if output.success() => InstallResult::new(
                tool,
                InstallStatus::Installed,
                format!("{tool} installed successfully from URL"),
            ),
            // Several installers exit non-zero after installing.
            Ok(output) => InstallResult::new(
                tool,
                InstallStatus::Installed,
                format!(
                    "{tool} installer executed (exit code: {})",
                    output.code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
                ),
            ),
            Err(CommandError::Timeout { .. }) => InstallResult::new(
                tool,
                InstallStatus::TimedOut,
                format!("Installation of {tool} timed out"),
            ),
            Err(error) => InstallResult::new(
                tool,
                InstallStatus::Failed,
                format!("Error installing {tool}: {error}"),
            ),
        }
    }

    fn install_portable(
        &self,
        tool: &str,
        archive: &Path,
        temp: &Path,
        lower_name: &str,
    ) -> InstallResult {
        if !lower_name.contains(PORTABLE_TOOL_MARKER) {
            return InstallResult::new(
                tool,
                InstallStatus::Failed,
                format!("{tool} downloaded as ZIP but no installer found"),
            );
        }

        let extracted = temp.join("extracted");
        let result = extract_zip(archive, &extracted)
            .map_err(|error| error.to_string())
            .and_then(|()| remove_path(&self.portable_dir).map_err(|error| error.to_string()))
            .and_then(|()| {
                copy_tree(&extracted, &self.portable_dir, &[]).map_err(|error| error.to_string())
            });

        match result {
            Ok(_) => InstallResult::new(
                tool,
                InstallStatus::Installed,
                format!("{tool} extracted to {}", self.portable_dir.display()),
            ),
            Err(error) => InstallResult::new(
                tool,
                InstallStatus::Failed,
                format!("Error installing {tool}: {error}"),
            ),
        }
    }
}

fn winget_failure(tool: &str, output: &CommandOutput) -> InstallResult {
    let combined = output.combined_lowercase();
    if combined.contains("already installed") || combined.contains("no applicable update found") {
        return InstallResult::new(
            tool,
            InstallStatus::AlreadyInstalled,
            format!("{tool} is already installed"),
        );
    }

    let details = if combined.contains("no package found") || combined.contains("no applicable") {
        "Package not found in winget repository".to_string()
    } else if combined.contains("administrator") {
        "Requires administrator privileges".to_string()
    } else if !output.stderr.trim().is_empty() {
        output.stderr.trim().to_string()
    } else if !output.stdout.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        format!(
            "Exit code: {}",
            output.code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
        )
    };
    InstallResult::new(
        tool,
        InstallStatus::Failed,
        format!("Failed to install {tool}: {details}"),
    )
}

fn silent_flags(tool: &str) -> &'static [&'static str] {
    match tool {
        "Mockoon" => &["/VERYSILENT", "/NORESTART"],
        "MobaXterm" => &["/VERYSILENT", "/SUPPRESSMSGBOXES", "/NORESTART"],
        "Insomnia" => &["/S"],
        _ => &["/S", "/SILENT", "/VERYSILENT"],
    }
}
