use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{context} ({path}): {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{context} ({path}): {source}")]
    Zip {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ArchiveError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    fn zip(context: &'static str, path: &Path, source: zip::result::ZipError) -> Self {
        Self::Zip {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Zip the directory `src` so that the archive holds a single top-level
/// folder named `root_name`.
///
/// # Errors
/// Returns an error if a file cannot be read or the archive cannot be written.
pub fn write_zip(src: &Path, dest: &Path, root_name: &str) -> Result<(), ArchiveError> {
    let file = std::fs::File::create(dest)
        .map_err(|error| ArchiveError::io("failed to create archive", dest, error))?;
    let mut writer = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|error| {
            ArchiveError::io("failed to walk backup directory", src, error.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let mut name = root_name.to_string();
        for component in relative.components() {
            name.push('/');
            name.push_str(&component.as_os_str().to_string_lossy());
        }

        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(|error| ArchiveError::zip("failed to add directory", entry.path(), error))?;
        } else {
            writer
                .start_file(name, options)
                .map_err(|error| ArchiveError::zip("failed to start entry", entry.path(), error))?;
            let mut input = std::fs::File::open(entry.path())
                .map_err(|error| ArchiveError::io("failed to read file", entry.path(), error))?;
            std::io::copy(&mut input, &mut writer)
                .map_err(|error| ArchiveError::io("failed to write entry", entry.path(), error))?;
        }
    }

    let mut file = writer
        .finish()
        .map_err(|error| ArchiveError::zip("failed to finalize archive", dest, error))?;
    file.flush()
        .map_err(|error| ArchiveError::io("failed to flush archive", dest, error))?;
    debug!("Wrote archive {}", dest.display());
    Ok(())
}

/// Extract `zip_path` into `dest`, skipping entries that would escape it.
///
/// # Errors
/// Returns an error if the archive is unreadable or a file cannot be written.
pub fn extract_zip(zip_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let mut archive = open(zip_path)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| ArchiveError::zip("failed to read zip entry", zip_path, error))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping zip entry with unsafe path");
            continue;
        };
        let out_path = dest.join(name);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|error| {
                ArchiveError::io("failed to create extraction directory", &out_path, error)
            })?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|error| {
                    ArchiveError::io("failed to create extraction parent directory", parent, error)
                })?;
            }
            let mut outfile = std::fs::File::create(&out_path).map_err(|error| {
                ArchiveError::io("failed to create extracted file", &out_path, error)
            })?;
            std::io::copy(&mut entry, &mut outfile).map_err(|error| {
                ArchiveError::io("failed to extract archive entry", &out_path, error)
            })?;
        }
    }

    debug!("Extracted {} to {}", zip_path.display(), dest.display());
    Ok(())
}

/// Read one entry of an archive into memory, if present.
///
/// # Errors
/// Returns an error if the archive itself cannot be opened or read.
pub fn read_entry(zip_path: &Path, entry_name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
    let mut archive = open(zip_path)?;

    let Ok(mut entry) = archive.by_name(entry_name) else {
        return Ok(None);
    };
    let mut data = Vec::new();
    entry
        .read_to_end(&mut data)
        .map_err(|error| ArchiveError::io("failed to read archive entry", zip_path, error))?;
    Ok(Some(data))
}

fn open(zip_path: &Path) -> Result<zip::ZipArchive<std::fs::File>, ArchiveError> {
    let file = std::fs::File::open(zip_path)
        .map_err(|error| ArchiveError::io("failed to open zip file", zip_path, error))?;
    zip::ZipArchive::new(file)
        .map_err(|error| ArchiveError::zip("failed to read zip archive", zip_path, error))
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::{extract_zip, read_entry, write_zip};

    #[test]
    fn write_zip_nests_contents_under_root_folder() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let src = temp.path().join("staged");
        std::fs::create_dir_all(src.join("vscode")).expect("dir should be created");
        std::fs::write(src.join("manifest.json"), "{}").expect("file should be written");
        std::fs::write(src.join("vscode").join("extensions.txt"), "a.b")
            .expect("file should be written");
        let zip_path = temp.path().join("backup_1.zip");

        write_zip(&src, &zip_path, "backup_1").expect("zip should be written");

        let manifest = read_entry(&zip_path, "backup_1/manifest.json")
            .expect("archive should open")
            .expect("manifest entry should exist");
        assert_eq!(manifest, b"{}");
        let extensions = read_entry(&zip_path, "backup_1/vscode/extensions.txt")
            .expect("archive should open");
        assert_eq!(extensions.as_deref(), Some(b"a.b".as_slice()));
        assert!(
            read_entry(&zip_path, "manifest.json")
                .expect("archive should open")
                .is_none()
        );
    }

    #[test]
    fn extract_zip_skips_unsafe_paths() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let zip_path = temp.path().join("unsafe.zip");
        let extract_dir = temp.path().join("extract");

        let zip_file = std::fs::File::create(&zip_path).expect("zip file should be created");
        let mut writer = zip::ZipWriter::new(zip_file);
        let options = zip::write::SimpleFileOptions::default();
        writer
            .start_file("../outside.txt", options)
            .expect("unsafe file entry should be started");
        writer
            .write_all(b"should not be extracted")
            .expect("unsafe file entry should be written");
        writer
            .start_file("inner/ok.txt", options)
            .expect("file entry should be started");
        writer.write_all(b"ok").expect("file entry should be written");
        writer.finish().expect("zip archive should be finalized");

        extract_zip(&zip_path, &extract_dir).expect("zip extraction should not fail");

        assert!(!temp.path().join("outside.txt").exists());
        assert_eq!(
            std::fs::read(extract_dir.join("inner/ok.txt")).expect("extracted file"),
            b"ok"
        );
    }
}
