use serde::Serialize;

const SQL_DEVELOPER_DOWNLOAD_PAGE: &str =
    "https://www.oracle.com/database/sqldeveloper/technologies/download/";

/// Winget package ids keyed by the exact display name on the manifest.
const WINGET_PACKAGES: &[(&str, &str)] = &[
    ("Visual Studio Code", "Microsoft.VisualStudioCode"),
    ("Python", "Python.Python.3.12"),
    ("Node.js", "OpenJS.NodeJS"),
    ("Git", "Git.Git"),
    ("Docker Desktop", "Docker.DockerDesktop"),
    ("Postman", "Postman.Postman"),
    ("IntelliJ IDEA", "JetBrains.IntelliJIDEA.Community"),
    ("PyCharm", "JetBrains.PyCharm.Community"),
    ("Android Studio", "Google.AndroidStudio"),
    ("JetBrains Toolbox", "JetBrains.Toolbox"),
    ("Notepad++", "Notepad++.Notepad++"),
    ("DBeaver", "dbeaver.dbeaver"),
    ("Azure Data Studio", "Microsoft.AzureDataStudio"),
    ("Oracle SQL Developer", "Oracle.SQLDeveloper"),
    ("Oracle SQL Developer (Config Only)", "Oracle.SQLDeveloper"),
    ("MobaXterm", "Mobatek.MobaXterm"),
    ("Google Chrome", "Google.Chrome"),
    ("Microsoft Edge", "Microsoft.Edge"),
    ("Mozilla Firefox", "Mozilla.Firefox"),
    ("Brave Browser", "Brave.Brave"),
    ("Opera", "Opera.Opera"),
    ("Vivaldi", "Vivaldi.Vivaldi"),
    ("VLC", "VideoLAN.VLC"),
    ("7-Zip", "7zip.7zip"),
    ("WinRAR", "RARLab.WinRAR"),
    ("Microsoft Teams", "Microsoft.Teams"),
    ("Slack", "SlackTechnologies.Slack"),
    ("Zoom", "Zoom.Zoom"),
    ("Chrome", "Google.Chrome"),
    ("Firefox", "Mozilla.Firefox"),
    ("Edge", "Microsoft.Edge"),
    ("Windows Terminal", "Microsoft.WindowsTerminal"),
    ("PowerShell", "Microsoft.PowerShell"),
    ("Anaconda", "Anaconda.Anaconda3"),
    ("Miniconda", "Anaconda.Miniconda3"),
    ("MySQL Workbench", "Oracle.MySQLWorkbench"),
    ("PuTTY", "PuTTY.PuTTY"),
    ("WinSCP", "WinSCP.WinSCP"),
    ("FileZilla", "TimKosse.FileZilla.Client"),
    ("Eclipse", "EclipseAdoptium.Temurin.11.JDK"),
    ("Maven", "Apache.Maven"),
    ("Gradle", "Gradle.Gradle"),
];

/// Where an installer comes from when winget cannot provide it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadSource {
    Direct { url: String },
    Chocolatey { package: String },
    /// Needs a person in the loop, usually a vendor login.
    Manual { url: String, message: String },
}

impl DownloadSource {
    /// Parse a download-table entry: `choco:<package>`, `manual:<url>|<message>`,
    /// or a plain URL. Oracle download pages always need a login.
    #[must_use]
    pub fn parse(entry: &str) -> Self {
        if let Some(package) = entry.strip_prefix("choco:") {
            return Self::Chocolatey {
                package: package.trim().to_string(),
            };
        }
        if let Some(rest) = entry.strip_prefix("manual:") {
            let (url, message) = match rest.split_once('|') {
                Some((url, message)) => (url.to_string(), message.to_string()),
                None => (
                    rest.to_string(),
                    format!("Manual download required from: {rest}"),
                ),
            };
            return Self::Manual { url, message };
        }
        if entry.starts_with("https://www.oracle.com") {
            return Self::Manual {
                url: entry.to_string(),
                message: "Requires Oracle account login".to_string(),
            };
        }
        Self::Direct {
            url: entry.to_string(),
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Direct { url } => url.clone(),
            Self::Chocolatey { package } => format!("choco:{package}"),
            Self::Manual { url, .. } => format!("manual:{url}"),
        }
    }
}

/// The known ways of getting a missing tool back on the machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallPlan {
    pub package_id: Option<String>,
    pub download: Option<DownloadSource>,
}

impl InstallPlan {
    #[must_use]
    pub fn has_source(&self) -> bool {
        self.package_id.is_some() || self.download.is_some()
    }

    /// True when nothing can be installed automatically: there is no package
    /// id and the download, if any, needs a person.
    #[must_use]
    pub fn is_manual_only(&self) -> bool {
        self.package_id.is_none()
            && matches!(self.download, None | Some(DownloadSource::Manual { .. }))
    }
}

/// Static tables mapping tool names to package ids and download URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallSources;

impl InstallSources {
    #[must_use]
    pub fn package_id(self, tool_name: &str) -> Option<&'static str> {
        WINGET_PACKAGES
            .iter()
            .find(|(name, _)| *name == tool_name)
            .map(|(_, id)| *id)
    }

    #[must_use]
    pub fn download_source(self, tool_name: &str, version: &str) -> Option<DownloadSource> {
        let version = version.trim();
        let entry = match tool_name {
            "Mockoon" if !version.is_empty() => format!(
                "https://github.com/mockoon/mockoon/releases/download/v{version}/mockoon.setup.{version}.exe"
            ),
            "Mockoon" => {
                "https://github.com/mockoon/mockoon/releases/latest/download/mockoon.setup.exe".to_string()
            }
            "Insomnia" => {
                "https://github.com/Kong/insomnia/releases/latest/download/Insomnia.Core.exe".to_string()
            }
            "MobaXterm" => {
                "https://download.mobatek.net/2432023122823706/MobaXterm_Installer_v24.3.exe".to_string()
            }
            "Oracle SQL Developer" if !version.is_empty() => format!(
                "manual:{SQL_DEVELOPER_DOWNLOAD_PAGE}|Download Oracle SQL Developer {version} (requires Oracle login, then extract to Program Files)"
            ),
            "Oracle SQL Developer" => format!(
                "manual:{SQL_DEVELOPER_DOWNLOAD_PAGE}|Download Oracle SQL Developer (requires Oracle login, then extract to Program Files)"
            ),
            _ => return None,
        };
        Some(DownloadSource::parse(&entry))
    }

    #[must_use]
    pub fn plan(self, tool_name: &str, version: &str) -> InstallPlan {
        InstallPlan {
            package_id: self.package_id(tool_name).map(str::to_string),
            download: self.download_source(tool_name, version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DownloadSource, InstallPlan, InstallSources};

    #[test]
    fn package_ids_match_exact_names_only() {
        let sources = InstallSources;

        assert_eq!(sources.package_id("Git"), Some("Git.Git"));
        assert_eq!(sources.package_id("Chrome"), Some("Google.Chrome"));
        assert_eq!(
            sources.package_id("Oracle SQL Developer (Config Only)"),
            Some("Oracle.SQLDeveloper")
        );
        assert_eq!(sources.package_id("git"), None);
        assert_eq!(sources.package_id("Mockoon"), None);
    }

    #[test]
    fn mockoon_url_follows_backed_up_version() {
        let sources = InstallSources;

        assert_eq!(
            sources.download_source("Mockoon", "6.2.0"),
            Some(DownloadSource::Direct {
                url: "https://github.com/mockoon/mockoon/releases/download/v6.2.0/mockoon.setup.6.2.0.exe"
                    .to_string()
            })
        );
        assert_eq!(
            sources.download_source("Mockoon", ""),
            Some(DownloadSource::Direct {
                url: "https://github.com/mockoon/mockoon/releases/latest/download/mockoon.setup.exe"
                    .to_string()
            })
        );
    }

    #[test]
    fn sql_developer_requires_manual_download() {
        let plan = InstallSources.plan("Oracle SQL Developer", "23.1");

        assert_eq!(plan.package_id.as_deref(), Some("Oracle.SQLDeveloper"));
        match plan.download {
            Some(DownloadSource::Manual { url, message }) => {
                assert!(url.starts_with("https://www.oracle.com"));
                assert!(message.contains("23.1"));
            }
            other => panic!("expected manual source, got {other:?}"),
        }
    }

    #[test]
    fn parses_table_entry_prefixes() {
        assert_eq!(
            DownloadSource::parse("choco:sqldeveloper"),
            DownloadSource::Chocolatey {
                package: "sqldeveloper".to_string()
            }
        );
        assert_eq!(
            DownloadSource::parse("manual:https://example.com/dl"),
            DownloadSource::Manual {
                url: "https://example.com/dl".to_string(),
                message: "Manual download required from: https://example.com/dl".to_string()
            }
        );
        assert!(matches!(
            DownloadSource::parse("https://www.oracle.com/tools/"),
            DownloadSource::Manual { .. }
        ));
        assert!(matches!(
            DownloadSource::parse("https://example.com/setup.exe"),
            DownloadSource::Direct { .. }
        ));
    }

    #[test]
    fn unknown_tool_has_no_plan() {
        let plan = InstallSources.plan("Obscure Tool", "1.0");

        assert!(!plan.has_source());
        assert!(plan.is_manual_only());
    }

    #[test]
    fn plans_with_an_automatic_route_are_not_manual_only() {
        let packaged = InstallPlan {
            package_id: Some("Git.Git".to_string()),
            download: None,
        };
        let direct = InstallPlan {
            package_id: None,
            download: Some(DownloadSource::parse("https://example.com/setup.exe")),
        };
        let manual = InstallPlan {
            package_id: None,
            download: Some(DownloadSource::parse("https://www.oracle.com/tools/")),
        };

        assert!(!packaged.is_manual_only());
        assert!(!direct.is_manual_only());
        assert!(manual.is_manual_only());
    }
}
