//! Recursive copies that tolerate locked files.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

/// Cache and transient folders never worth carrying into a backup.
pub const SKIP_FOLDERS: &[&str] = &[
    "Cache",
    "Code Cache",
    "GPUCache",
    "Service Worker",
    "DawnCache",
    "ShaderCache",
    "blob_storage",
    "Session Storage",
    "IndexedDB",
    "File System",
    "WebStorage",
    "Local Storage",
    "BrowserMetrics",
    "optimization_guide_hints",
    "optimization_guide_model_and_features_store",
    "Storage",
    "VideoDecodeStats",
    "BudgetDatabase",
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyStats {
    pub copied: usize,
    pub skipped: usize,
    pub skipped_paths: Vec<PathBuf>,
}

/// Copy `src` into `dst`, leaving out any entry whose name is in `skip`.
///
/// Each file is copied independently; a file that cannot be read or written
/// is counted in [`CopyStats::skipped`] and the walk continues.
///
/// # Errors
/// Returns an error only if `dst` itself cannot be created.
pub fn copy_tree(src: &Path, dst: &Path, skip: &[&str]) -> std::io::Result<CopyStats> {
    std::fs::create_dir_all(dst)?;
    let mut stats = CopyStats::default();

    let walker = WalkDir::new(src).follow_links(false).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry
                .file_name()
                .to_str()
                .is_some_and(|name| skip.contains(&name))
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                let path = error.path().map(Path::to_path_buf).unwrap_or_default();
                debug!("Skipping unreadable entry {}: {error}", path.display());
                stats.skipped += 1;
                stats.skipped_paths.push(path);
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);

        let result = if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
        } else {
            copy_file(entry.path(), &target)
        };

        match result {
            Ok(()) if entry.file_type().is_dir() => {}
            Ok(()) => stats.copied += 1,
            Err(error) => {
                debug!("Skipping {}: {error}", entry.path().display());
                stats.skipped += 1;
                stats.skipped_paths.push(relative.to_path_buf());
            }
        }
    }

    if stats.skipped > 0 {
        warn!(
            "Copied {} files from {}, skipped {} locked or unreadable",
            stats.copied,
            src.display(),
            stats.skipped
        );
    }

    Ok(stats)
}

/// Copy one file, creating parent directories and carrying the modification
/// time across.
///
/// # Errors
/// Returns the underlying IO error when the copy fails.
pub fn copy_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, dst)?;

    if let Ok(modified) = std::fs::metadata(src).and_then(|meta| meta.modified())
        && let Ok(file) = std::fs::OpenOptions::new().write(true).open(dst)
    {
        let _ = file.set_modified(modified);
    }

    Ok(())
}

/// Total size of the files under `path`, or the file's own size.
#[must_use]
pub fn path_size(path: &Path) -> u64 {
    if path.is_file() {
        return std::fs::metadata(path).map_or(0, |meta| meta.len());
    }

    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Remove a file or directory, treating "already gone" as success.
///
/// # Errors
/// Returns the IO error for anything other than a missing path.
pub fn remove_path(path: &Path) -> std::io::Result<()> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(error) => Err(error),
    };

    match result {
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Move a directory or file, falling back to [`copy_into_place`] across
/// volumes.
///
/// # Errors
/// Returns an error when both the rename and the fallback copy fail.
pub fn move_path(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    debug!("Rename of {} failed, copying instead", src.display());
    copy_into_place(src, dst)?;
    remove_path(src)
}

/// Copy `src` into a hidden sibling of `dst` and rename it into place, so
/// `dst` only appears once the copy is complete. The partial copy is removed
/// when any file cannot be copied; `src` is left untouched.
///
/// # Errors
/// Returns an error when a file cannot be copied or the final rename fails.
pub fn copy_into_place(src: &Path, dst: &Path) -> std::io::Result<()> {
    let parent = dst
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let partial_dir = tempfile::Builder::new()
        .prefix(".partial-")
        .tempdir_in(parent)?;
    let partial = partial_dir.path().join("item");

    if src.is_dir() {
        let stats = copy_tree(src, &partial, &[])?;
        if stats.skipped > 0 {
            return Err(std::io::Error::other(format!(
                "{} files could not be copied from {}",
                stats.skipped,
                src.display()
            )));
        }
    } else {
        copy_file(src, &partial)?;
    }

    std::fs::rename(&partial, dst)
}
