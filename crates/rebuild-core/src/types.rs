use serde::{Deserialize, Deserializer, Serialize};

/// What kind of configuration an artifact holds, serialized as the manifest's
/// `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    File,
    #[serde(alias = "directory")]
    Folder,
    Registry,
    #[serde(rename = "extensions")]
    ExtensionList,
    #[serde(rename = "plugins")]
    PluginList,
    #[serde(rename = "packages")]
    PackageList,
    /// Kinds written by newer versions; kept so the manifest stays readable.
    #[serde(other)]
    Unknown,
}

impl ArtifactKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
            Self::Registry => "registry",
            Self::ExtensionList => "extensions",
            Self::PluginList => "plugins",
            Self::PackageList => "packages",
            Self::Unknown => "unknown",
        }
    }

    /// Generated name lists rather than copies of user data.
    #[must_use]
    pub fn is_inventory(self) -> bool {
        matches!(
            self,
            Self::ExtensionList | Self::PluginList | Self::PackageList
        )
    }

    pub(crate) fn inventory_file_name(self) -> Option<&'static str> {
        match self {
            Self::ExtensionList => Some("extensions.txt"),
            Self::PluginList => Some("plugins.txt"),
            Self::PackageList => Some("packages.txt"),
            _ => None,
        }
    }
}

/// One location that makes up part of a tool's configuration.
///
/// `source` holds `%VAR%` placeholders and at most one `*` segment. For
/// registry specs it is a key path, for extension lists it is the CLI
/// command, and inventory specs may list several patterns separated by `;`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedArtifact {
    pub description: String,
    pub source: String,
    pub destination: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// A tool reported by the detection script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedTool {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Version", default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(alias = "Path", default, deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(
        rename = "type",
        alias = "Type",
        default,
        deserialize_with = "null_as_default"
    )]
    pub category: String,
}

impl DetectedTool {
    pub fn new(name: impl Into<String>, version: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: path.into(),
            category: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Canonical identity of catalog tools that need behaviour beyond copying
/// their artifacts back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    VsCode,
    VsCodeInsiders,
    IntellijIdea,
    PyCharm,
    WebStorm,
    Rider,
    DataGrip,
    SublimeText,
    SqlDeveloper,
    Other,
}

impl ToolId {
    #[must_use]
    pub fn from_slug(slug: &str) -> Self {
        match slug {
            "vscode" => Self::VsCode,
            "vscode-insiders" => Self::VsCodeInsiders,
            "intellij" => Self::IntellijIdea,
            "pycharm" => Self::PyCharm,
            "webstorm" => Self::WebStorm,
            "rider" => Self::Rider,
            "datagrip" => Self::DataGrip,
            "sublime" => Self::SublimeText,
            "sqldeveloper" => Self::SqlDeveloper,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn capabilities(self) -> ToolCapabilities {
        match self {
            Self::VsCode => ToolCapabilities {
                extension_cli: Some("code"),
                ..ToolCapabilities::default()
            },
            Self::VsCodeInsiders => ToolCapabilities {
                extension_cli: Some("code-insiders"),
                ..ToolCapabilities::default()
            },
            Self::IntellijIdea | Self::PyCharm | Self::WebStorm | Self::Rider | Self::DataGrip => {
                ToolCapabilities {
                    plugin_list: true,
                    ..ToolCapabilities::default()
                }
            }
            Self::SublimeText => ToolCapabilities {
                package_list: true,
                ..ToolCapabilities::default()
            },
            Self::SqlDeveloper => ToolCapabilities {
                settings_migration: true,
                ..ToolCapabilities::default()
            },
            Self::Other => ToolCapabilities::default(),
        }
    }
}

/// Post-restore behaviour for a tool, resolved once when the catalog loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolCapabilities {
    /// CLI used to reinstall extensions one at a time.
    pub extension_cli: Option<&'static str>,
    pub plugin_list: bool,
    pub package_list: bool,
    pub settings_migration: bool,
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ArtifactKind, CapturedArtifact, DetectedTool, ToolId};

    #[test]
    fn artifact_kind_reads_legacy_and_unknown_names() {
        let kinds: Vec<ArtifactKind> =
            serde_json::from_value(json!(["file", "directory", "folder", "extensions", "shortcut"]))
                .expect("artifact kinds should deserialize");

        assert_eq!(
            kinds,
            vec![
                ArtifactKind::File,
                ArtifactKind::Folder,
                ArtifactKind::Folder,
                ArtifactKind::ExtensionList,
                ArtifactKind::Unknown,
            ]
        );
    }

    #[test]
    fn captured_artifact_serializes_count_or_size_only() {
        let artifact = CapturedArtifact {
            description: "Extensions List".to_string(),
            source: "code CLI".to_string(),
            destination: "vscode/extensions.txt".to_string(),
            kind: ArtifactKind::ExtensionList,
            size_bytes: None,
            count: Some(12),
        };

        let value = serde_json::to_value(&artifact).expect("artifact should serialize");

        assert_eq!(value["type"], "extensions");
        assert_eq!(value["count"], 12);
        assert!(value.get("size_bytes").is_none());
    }

    #[test]
    fn detected_tool_accepts_script_casing_and_nulls() {
        let tool: DetectedTool = serde_json::from_value(json!({
            "Name": "Git",
            "Version": null,
            "Path": "C:\\Program Files\\Git\\cmd\\git.exe",
            "Type": "VCS"
        }))
        .expect("detected tool should deserialize");

        assert_eq!(tool.name, "Git");
        assert_eq!(tool.version, "");
        assert_eq!(tool.category, "VCS");
    }

    #[test]
    fn tool_ids_resolve_capabilities() {
        assert_eq!(
            ToolId::from_slug("vscode").capabilities().extension_cli,
            Some("code")
        );
        assert!(ToolId::from_slug("rider").capabilities().plugin_list);
        assert!(ToolId::from_slug("sqldeveloper").capabilities().settings_migration);
        assert_eq!(
            ToolId::from_slug("git").capabilities(),
            super::ToolCapabilities::default()
        );
    }
}
