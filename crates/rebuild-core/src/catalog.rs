use std::collections::HashSet;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::CatalogError;
use crate::types::{ArtifactKind, ArtifactSpec, ToolCapabilities, ToolId};

const BUILTIN_CATALOG: &str = include_str!("catalog.json");

#[derive(Debug, Deserialize)]
struct CatalogFile {
    tools: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    display_name: String,
    internal_name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    artifacts: Vec<ArtifactSpec>,
}

#[derive(Debug, Clone)]
pub struct ToolCatalogEntry {
    pub display_name: String,
    /// Backup subfolder for this tool.
    pub internal_name: String,
    pub aliases: Vec<String>,
    pub artifacts: Vec<ArtifactSpec>,
    pub tool: ToolId,
    pub capabilities: ToolCapabilities,
}

impl ToolCatalogEntry {
    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.display_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Immutable table of the tools whose configuration can be backed up.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<ToolCatalogEntry>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    ///
    /// # Errors
    /// Returns an error if the embedded table is malformed.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid catalog.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// # Errors
    /// Returns an error on invalid JSON, duplicate names, or patterns with
    /// more than one wildcard.
    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(content)?;
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(file.tools.len());

        for raw in file.tools {
            if !seen.insert(raw.display_name.to_lowercase()) {
                return Err(CatalogError::Duplicate {
                    name: raw.display_name,
                });
            }

            for spec in &raw.artifacts {
                let checks_wildcards = !matches!(
                    spec.kind,
                    ArtifactKind::Registry | ArtifactKind::ExtensionList
                );
                let too_many = spec
                    .source
                    .split(';')
                    .any(|pattern| pattern.matches('*').count() > 1);
                if checks_wildcards && too_many {
                    return Err(CatalogError::MultipleWildcards {
                        tool: raw.display_name.clone(),
                        pattern: spec.source.clone(),
                    });
                }
            }

            let tool = ToolId::from_slug(&raw.internal_name);
            entries.push(ToolCatalogEntry {
                capabilities: tool.capabilities(),
                tool,
                display_name: raw.display_name,
                internal_name: raw.internal_name,
                aliases: raw.aliases,
                artifacts: raw.artifacts,
            });
        }

        debug!("Loaded catalog with {} tools", entries.len());
        Ok(Self { entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[ToolCatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for a tool name as reported by detection.
    ///
    /// Tries an exact match on the display name or an alias, then a
    /// case-insensitive one, then a case-insensitive substring match in either
    /// direction, in catalog order.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&ToolCatalogEntry> {
        let needle = name.trim();
        if needle.is_empty() {
            return None;
        }
        let lower = needle.to_lowercase();

        self.entries
            .iter()
            .find(|entry| entry.names().any(|n| n == needle))
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|entry| entry.names().any(|n| n.to_lowercase() == lower))
            })
            .or_else(|| {
                self.entries.iter().find(|entry| {
                    entry.names().any(|n| {
                        let candidate = n.to_lowercase();
                        candidate.contains(&lower) || lower.contains(&candidate)
                    })
                })
            })
    }
}
