//! Carrying SQL Developer settings forward between versioned profile folders.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::copy::{copy_tree, remove_path};

/// Prefixes of the settings folders copied from the previous version.
const MIGRATED_PREFIXES: &[&str] = &["o.sqldeveloper.", "o.jdeveloper.", "o.ide."];
const MIGRATED_FOLDERS: &[&str] = &["system_cache", "UserSnippets"];
const CONNECTIONS_FILE: &str = "connections.json";
/// A connections file at or below this size holds no connections.
const EMPTY_CONNECTIONS_MAX_BYTES: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The settings root does not exist.
    NoSettings,
    /// Fewer than two `system*` folders.
    NothingToMigrate,
    AlreadyMigrated { newest: PathBuf },
    Migrated {
        from: PathBuf,
        to: PathBuf,
        folders: usize,
    },
}

/// Copy connection and preference folders from the second-newest
/// `system*` folder under `root` into the newest.
///
/// Does nothing when the newest folder already has connections, so running it
/// again after a successful migration changes nothing.
///
/// # Errors
/// Returns an error if `root` or the source folder cannot be read, or a
/// folder cannot be copied.
pub fn migrate_sqldeveloper(root: &Path) -> std::io::Result<MigrationOutcome> {
    if !root.is_dir() {
        return Ok(MigrationOutcome::NoSettings);
    }

    let mut systems: Vec<String> = std::fs::read_dir(root)?
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("system"))
        .collect();
    if systems.len() < 2 {
        return Ok(MigrationOutcome::NothingToMigrate);
    }
    systems.sort_unstable_by(|a, b| {
        version_key(b)
            .cmp(&version_key(a))
            .then_with(|| b.cmp(a))
    });

    let newest = root.join(&systems[0]);
    let source = root.join(&systems[1]);
    if has_connections(&newest) {
        debug!("{} already has connections", newest.display());
        return Ok(MigrationOutcome::AlreadyMigrated { newest });
    }

    let mut folders = 0;
    for entry in std::fs::read_dir(&source)?.flatten() {
        let path = entry.path();
        let Some(name) = entry.file_name().into_string().ok() else {
            continue;
        };
        let wanted = MIGRATED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
            || MIGRATED_FOLDERS.contains(&name.as_str());
        if !wanted || !path.is_dir() {
            continue;
        }

        let dest = newest.join(&name);
        remove_path(&dest)?;
        copy_tree(&path, &dest, &[])?;
        folders += 1;
    }

    info!(
        "Migrated {folders} SQL Developer folders from {} to {}",
        source.display(),
        newest.display()
    );
    Ok(MigrationOutcome::Migrated {
        from: source,
        to: newest,
        folders,
    })
}

/// `system23.1.0.097.1607` -> `[23, 1, 0, 97, 1607]`. Folders whose suffix is
/// not dotted numbers get `None` and sort below every versioned folder.
fn version_key(name: &str) -> Option<Vec<u64>> {
    name.strip_prefix("system")?
        .split('.')
        .map(|part| part.parse().ok())
        .collect()
}

fn has_connections(dir: &Path) -> bool {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == CONNECTIONS_FILE)
        .filter_map(|entry| entry.metadata().ok())
        .any(|metadata| metadata.len() > EMPTY_CONNECTIONS_MAX_BYTES)
}
