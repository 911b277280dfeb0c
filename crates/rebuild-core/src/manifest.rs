use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::{CapturedArtifact, EnvVar, null_as_default};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ENV_VARS_FILE: &str = "environment_variables.json";
pub const BACKUP_PREFIX: &str = "backup_";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The record of one backup, written last so an interrupted backup never
/// shows up as complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub backup_name: String,
    /// `YYYYMMDD_HHMMSS`; sorts lexically in creation order.
    pub timestamp: String,
    #[serde(rename = "datetime", default)]
    pub created_at: String,
    #[serde(default)]
    pub tools: Vec<ToolManifestEntry>,
    #[serde(default)]
    pub environment_variables: Vec<EnvVar>,
    #[serde(rename = "backup_location", default)]
    pub storage_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolManifestEntry {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(rename = "path", default, deserialize_with = "null_as_default")]
    pub install_path: String,
    #[serde(default)]
    pub backed_up_items: Vec<CapturedArtifact>,
}

impl Manifest {
    /// # Errors
    /// Returns an error if the bytes are not a manifest.
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&ToolManifestEntry> {
        self.tools
            .iter()
            .find(|tool| tool.name.eq_ignore_ascii_case(name))
    }

    /// The creation time, when the timestamp can be parsed.
    #[must_use]
    pub fn created(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).ok()
    }

    #[must_use]
    pub fn storage_path(&self) -> Option<&Path> {
        (!self.storage_path.is_empty()).then(|| Path::new(&self.storage_path))
    }
}

#[must_use]
pub fn format_timestamp(now: &DateTime<Local>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

#[must_use]
pub fn format_created_at(now: &DateTime<Local>) -> String {
    now.naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Ensure a backup name carries the prefix the store scans for.
#[must_use]
pub fn normalize_backup_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.starts_with(BACKUP_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{BACKUP_PREFIX}{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};
    use serde_json::json;

    use super::{Manifest, format_created_at, format_timestamp, normalize_backup_name};
    use crate::types::ArtifactKind;

    #[test]
    fn reads_manifest_written_by_older_versions() {
        let value = json!({
            "backup_name": "backup_20240115_103000",
            "timestamp": "20240115_103000",
            "datetime": "2024-01-15T10:30:00.123456",
            "tools": [{
                "name": "Visual Studio Code",
                "version": "1.85.0",
                "path": "C:\\Program Files\\Microsoft VS Code\\Code.exe",
                "backed_up_items": [{
                    "description": "User settings",
                    "source": "C:\\Users\\dev\\AppData\\Roaming\\Code\\User",
                    "destination": "C:\\Temp\\backup_20240115_103000\\vscode\\User",
                    "type": "directory",
                    "size_bytes": 2048
                }]
            }],
            "environment_variables": [{"name": "JAVA_HOME", "value": "C:\\Java\\jdk-17"}],
            "backup_location": "C:\\Temp\\backup_20240115_103000"
        });

        let manifest: Manifest =
            serde_json::from_value(value).expect("legacy manifest should deserialize");

        assert_eq!(manifest.tools.len(), 1);
        assert_eq!(
            manifest.tools[0].backed_up_items[0].kind,
            ArtifactKind::Folder
        );
        assert_eq!(manifest.environment_variables[0].name, "JAVA_HOME");
        assert!(manifest.created().is_some());
        assert!(manifest.tool("visual studio code").is_some());
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let manifest = Manifest {
            backup_name: "backup_1".to_string(),
            timestamp: "20240101_000000".to_string(),
            created_at: "2024-01-01T00:00:00.000000".to_string(),
            tools: Vec::new(),
            environment_variables: Vec::new(),
            storage_path: "D:\\Backups\\backup_1".to_string(),
        };

        let value = serde_json::to_value(&manifest).expect("manifest should serialize");

        assert_eq!(value["datetime"], "2024-01-01T00:00:00.000000");
        assert_eq!(value["backup_location"], "D:\\Backups\\backup_1");
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn timestamps_sort_in_creation_order() {
        let earlier = Local
            .with_ymd_and_hms(2023, 12, 31, 23, 59, 59)
            .single()
            .expect("valid local time");
        let later = Local
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid local time");

        let a = format_timestamp(&earlier);
        let b = format_timestamp(&later);

        assert_eq!(a, "20231231_235959");
        assert!(a < b);
        assert!(format_created_at(&later).starts_with("2024-01-01T00:00:00."));
    }

    #[test]
    fn backup_names_get_the_scan_prefix() {
        assert_eq!(normalize_backup_name("backup_laptop"), "backup_laptop");
        assert_eq!(normalize_backup_name("laptop"), "backup_laptop");
    }
}
