//! Plain-text rendering of command results.

use std::fmt::Write as _;

use rebuild_core::env::EnvRestoreOutcome;
use rebuild_core::{
    BackupDescriptor, BackupOutcome, Catalog, DetectionCache, Manifest, ProgressEvent,
    ReconciliationResult,
};
use rebuild_installer::{Installer, ToolOutcome};

const ENV_PREVIEW: usize = 5;

pub fn backup_summary(outcome: &BackupOutcome) -> String {
    let results = &outcome.results;
    let mut out = String::new();

    if !results.success.is_empty() {
        let _ = writeln!(
            out,
            "Successfully backed up {} tool(s):",
            results.success.len()
        );
        for tool in &results.success {
            let _ = writeln!(out, "  - {tool}");
        }
    }

    if !results.failed.is_empty() {
        let _ = writeln!(out, "Failed to back up {} item(s):", results.failed.len());
        for failure in &results.failed {
            let _ = writeln!(
                out,
                "  - {} ({}): {}",
                failure.tool, failure.path, failure.error
            );
        }
    }

    if !results.skipped.is_empty() {
        let _ = writeln!(out, "Skipped {} tool(s):", results.skipped.len());
        for skipped in &results.skipped {
            let _ = writeln!(out, "  - {}: {}", skipped.tool, skipped.reason);
        }
    }

    let kind = if outcome.is_archived {
        "archive"
    } else {
        "folder"
    };
    let _ = write!(
        out,
        "Backup location ({kind}): {}",
        outcome.location.display()
    );
    out
}

pub fn backup_details(manifest: &Manifest, location: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Backup: {}", manifest.backup_name);
    let _ = writeln!(out, "Created: {}", manifest.created_at);
    let _ = writeln!(out, "Location: {location}");
    out.push('\n');

    if manifest.tools.is_empty() {
        out.push_str("Tools: None\n");
    } else {
        let _ = writeln!(out, "Tools ({}):", manifest.tools.len());
        for tool in &manifest.tools {
            let _ = writeln!(out, "  - {} {}", tool.name, display_version(&tool.version));
            let _ = writeln!(
                out,
                "      {} item(s) backed up",
                tool.backed_up_items.len()
            );
        }
    }
    out.push('\n');

    let env_vars = &manifest.environment_variables;
    if env_vars.is_empty() {
        out.push_str("Environment Variables: None");
    } else {
        let _ = write!(out, "Environment Variables ({}):", env_vars.len());
        for var in env_vars.iter().take(ENV_PREVIEW) {
            let _ = write!(out, "\n  - {}", var.name);
        }
        if env_vars.len() > ENV_PREVIEW {
            let _ = write!(out, "\n  ... and {} more", env_vars.len() - ENV_PREVIEW);
        }
    }
    out
}

pub fn backup_list(backups: &[BackupDescriptor]) -> String {
    if backups.is_empty() {
        return "No backups found".to_string();
    }

    let mut out = String::new();
    for backup in backups {
        let created = backup
            .manifest
            .created()
            .map_or_else(|| backup.timestamp().to_string(), |dt| dt.to_string());
        let _ = writeln!(
            out,
            "{:<28} {:<20} {:>3} tool(s) {:>3} env var(s){}",
            backup.name,
            created,
            backup.tool_count,
            backup.env_var_count,
            if backup.is_archived { "  [zip]" } else { "" }
        );
    }
    out.truncate(out.trim_end().len());
    out
}

pub fn reconciliation(result: &ReconciliationResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Installed ({}):", result.installed.len());
    for tool in &result.installed {
        let _ = writeln!(out, "  - {} {}", tool.name, display_version(&tool.version));
    }

    let _ = writeln!(out, "Version mismatch ({}):", result.version_mismatch.len());
    for tool in &result.version_mismatch {
        let _ = writeln!(
            out,
            "  - {}: backup {}, installed {}",
            tool.name,
            display_version(&tool.backup_version),
            display_version(&tool.installed_version)
        );
    }

    let _ = write!(out, "Missing ({}):", result.missing.len());
    for tool in &result.missing {
        let method = Installer::describe(&tool.plan).unwrap_or_else(|| "manual".to_string());
        let _ = write!(
            out,
            "\n  - {} {} [{method}]",
            tool.name,
            display_version(&tool.version)
        );
    }
    out
}

pub fn progress_line(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Starting { index, total, tool } => format!("[{index}/{total}] {tool}"),
        ProgressEvent::Installing { method, .. } => format!("  installing via {method}"),
        ProgressEvent::InstallComplete {
            success, message, ..
        } => {
            let mark = if *success { "ok" } else { "!!" };
            format!("  {mark} {message}")
        }
        ProgressEvent::Restoring { .. } => "  restoring configuration".to_string(),
        ProgressEvent::Complete { report, .. } => format!(
            "  {} restored, {} failed, {} skipped",
            report.restored.len(),
            report.failed.len(),
            report.skipped.len()
        ),
    }
}

pub fn session_summary(outcomes: &[ToolOutcome]) -> String {
    let mut out = String::new();
    let manual: Vec<&ToolOutcome> = outcomes.iter().filter(|o| o.requires_manual()).collect();
    let failed: Vec<&ToolOutcome> = outcomes
        .iter()
        .filter(|o| {
            !o.report.success()
                || o.install
                    .as_ref()
                    .is_some_and(|i| !i.success() && !i.requires_manual())
        })
        .collect();

    let _ = write!(out, "Processed {} tool(s)", outcomes.len());

    if !failed.is_empty() {
        out.push_str("\nProblems:");
        for outcome in failed {
            if let Some(install) = outcome
                .install
                .as_ref()
                .filter(|i| !i.success() && !i.requires_manual())
            {
                let _ = write!(out, "\n  - {}: {}", outcome.tool, install.message);
            }
            for failure in &outcome.report.failed {
                let _ = write!(out, "\n  - {}: {failure}", outcome.tool);
            }
        }
    }

    if !manual.is_empty() {
        out.push_str("\nManual installation needed (configuration already restored):");
        for outcome in manual {
            if let Some(install) = &outcome.install {
                let _ = write!(out, "\n  - {}: {}", outcome.tool, install.message);
            }
        }
    }
    out
}

pub fn detection(cache: &DetectionCache) -> String {
    let mut out = String::new();
    for tool in &cache.tools {
        let _ = writeln!(
            out,
            "{:<32} {:<16} {}",
            tool.name,
            display_version(&tool.version),
            tool.path
        );
    }
    let summary = cache
        .summary()
        .into_iter()
        .map(|(category, count)| format!("{category}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = write!(
        out,
        "{} tool(s) detected at {}",
        cache.tools.len(),
        cache.detected_at.to_rfc3339()
    );
    if !summary.is_empty() {
        let _ = write!(out, " ({summary})");
    }
    out
}

pub fn catalog(catalog: &Catalog) -> String {
    let mut out = String::new();
    for entry in catalog.entries() {
        let _ = writeln!(
            out,
            "{:<32} {:<20} {} artifact(s)",
            entry.display_name,
            entry.internal_name,
            entry.artifacts.len()
        );
    }
    let _ = write!(out, "{} tool(s) in catalog", catalog.len());
    out
}

pub fn env_outcome(name: &str, outcome: &EnvRestoreOutcome) -> String {
    match outcome {
        EnvRestoreOutcome::Restored => format!("  ok {name}"),
        EnvRestoreOutcome::Rejected(reason) => format!("  skipped {name}: {reason}"),
        EnvRestoreOutcome::Failed(reason) => format!("  failed {name}: {reason}"),
        EnvRestoreOutcome::Undetermined(reason) => format!("  unknown {name}: {reason}"),
    }
}

fn display_version(version: &str) -> &str {
    if version.is_empty() { "(unknown)" } else { version }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rebuild_core::{
        BackupOutcome, BackupResults, EnvVar, Manifest, RestoreReport, SkippedTool,
        ToolManifestEntry,
    };
    use rebuild_installer::{InstallResult, InstallStatus, ToolOutcome};

    use super::{backup_details, backup_summary, session_summary};

    fn manifest(env_count: usize) -> Manifest {
        Manifest {
            backup_name: "backup_20240101_120000".to_string(),
            timestamp: "20240101_120000".to_string(),
            created_at: "2024-01-01T12:00:00".to_string(),
            tools: vec![ToolManifestEntry {
                name: "Git".to_string(),
                version: "2.43.0".to_string(),
                install_path: String::new(),
                backed_up_items: Vec::new(),
            }],
            environment_variables: (0..env_count)
                .map(|i| EnvVar::new(format!("VAR_{i}"), "value"))
                .collect(),
            storage_path: String::new(),
        }
    }

    #[test]
    fn details_show_first_five_env_vars() {
        let text = backup_details(&manifest(7), "D:/Backups/backup_20240101_120000");

        assert!(text.contains("Environment Variables (7):"));
        assert!(text.contains("VAR_4"));
        assert!(!text.contains("VAR_5"));
        assert!(text.ends_with("... and 2 more"));
        assert!(text.contains("  - Git 2.43.0\n      0 item(s) backed up"));
    }

    #[test]
    fn details_without_env_vars_say_none() {
        let text = backup_details(&manifest(0), "here");
        assert!(text.ends_with("Environment Variables: None"));
    }

    #[test]
    fn summary_lists_skips_and_location() {
        let outcome = BackupOutcome {
            location: PathBuf::from("backups").join("backup_1"),
            is_archived: false,
            manifest: manifest(0),
            results: BackupResults {
                success: vec!["Git".to_string()],
                failed: Vec::new(),
                skipped: vec![SkippedTool {
                    tool: "Foo".to_string(),
                    reason: "No backup configuration defined".to_string(),
                }],
            },
        };

        let text = backup_summary(&outcome);

        assert!(text.starts_with("Successfully backed up 1 tool(s):\n  - Git\n"));
        assert!(text.contains("Skipped 1 tool(s):\n  - Foo: No backup configuration defined"));
        assert!(text.contains("Backup location (folder): "));
    }

    #[test]
    fn session_summary_separates_manual_installs() {
        let outcomes = vec![ToolOutcome {
            tool: "Oracle SQL Developer".to_string(),
            install: Some(InstallResult {
                tool: "Oracle SQL Developer".to_string(),
                status: InstallStatus::RequiresManual { url: None },
                message: "Requires Oracle account login".to_string(),
                output: None,
            }),
            report: RestoreReport {
                restored: vec!["Directory: system".to_string()],
                ..RestoreReport::default()
            },
        }];

        let text = session_summary(&outcomes);

        assert!(!text.contains("Problems:"));
        assert!(text.contains("Manual installation needed"));
        assert!(text.contains("Oracle SQL Developer: Requires Oracle account login"));
    }
}
