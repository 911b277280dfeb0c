use std::collections::HashMap;

use serde::Serialize;

use crate::manifest::{Manifest, ToolManifestEntry};
use crate::sources::{InstallPlan, InstallSources};
use crate::types::DetectedTool;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingTool {
    pub name: String,
    pub version: String,
    pub plan: InstallPlan,
    #[serde(skip)]
    pub entry: ToolManifestEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledTool {
    pub name: String,
    pub version: String,
    #[serde(skip)]
    pub entry: ToolManifestEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionMismatch {
    pub name: String,
    pub backup_version: String,
    pub installed_version: String,
    #[serde(skip)]
    pub entry: ToolManifestEntry,
}

/// Every backed-up tool lands in exactly one of the three lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub missing: Vec<MissingTool>,
    pub installed: Vec<InstalledTool>,
    pub version_mismatch: Vec<VersionMismatch>,
}

impl ReconciliationResult {
    #[must_use]
    pub fn total(&self) -> usize {
        self.missing.len() + self.installed.len() + self.version_mismatch.len()
    }
}

/// Compare the tools in `manifest` with what is installed now.
///
/// Names are matched case-insensitively but otherwise exactly; version strings
/// are compared as-is.
#[must_use]
pub fn reconcile(
    manifest: &Manifest,
    detected: &[DetectedTool],
    sources: InstallSources,
) -> ReconciliationResult {
    let by_name: HashMap<String, &DetectedTool> = detected
        .iter()
        .map(|tool| (tool.name.to_lowercase(), tool))
        .collect();

    let mut result = ReconciliationResult::default();
    for entry in &manifest.tools {
        match by_name.get(&entry.name.to_lowercase()) {
            Some(installed) if installed.version == entry.version => {
                result.installed.push(InstalledTool {
                    name: entry.name.clone(),
                    version: entry.version.clone(),
                    entry: entry.clone(),
                });
            }
            Some(installed) => {
                result.version_mismatch.push(VersionMismatch {
                    name: entry.name.clone(),
                    backup_version: entry.version.clone(),
                    installed_version: installed.version.clone(),
                    entry: entry.clone(),
                });
            }
            None => {
                result.missing.push(MissingTool {
                    name: entry.name.clone(),
                    version: entry.version.clone(),
                    plan: sources.plan(&entry.name, &entry.version),
                    entry: entry.clone(),
                });
            }
        }
    }
    result
}
