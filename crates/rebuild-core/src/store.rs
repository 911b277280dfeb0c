use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};
use serde::Serialize;

use crate::archive::{extract_zip, read_entry};
use crate::copy::remove_path;
use crate::error::StoreError;
use crate::manifest::{BACKUP_PREFIX, MANIFEST_FILE, Manifest};

/// A backup found under the backup root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupDescriptor {
    pub name: String,
    pub storage_path: PathBuf,
    pub is_archived: bool,
    pub tool_count: usize,
    pub env_var_count: usize,
    #[serde(skip)]
    pub manifest: Manifest,
}

impl BackupDescriptor {
    fn new(name: String, storage_path: PathBuf, is_archived: bool, manifest: Manifest) -> Self {
        Self {
            name,
            storage_path,
            is_archived,
            tool_count: manifest.tools.len(),
            env_var_count: manifest.environment_variables.len(),
            manifest,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.manifest.timestamp
    }
}

/// A backup ready to restore from: `working_dir` holds the same layout
/// whether the backup was a directory or an archive.
#[derive(Debug, Clone)]
pub struct BackupDetails {
    pub working_dir: PathBuf,
    pub manifest: Manifest,
}

pub struct BackupStore {
    root: PathBuf,
    extract_root: PathBuf,
    /// Archive path to (extraction target, working directory).
    extracted: Mutex<HashMap<PathBuf, (PathBuf, PathBuf)>>,
}

impl BackupStore {
    pub fn new(root: impl Into<PathBuf>, extract_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extract_root: extract_root.into(),
            extracted: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every valid backup, newest first. Directories without a manifest and
    /// archives that cannot be read are left out.
    ///
    /// # Errors
    /// Returns an error if the backup root exists but cannot be read.
    pub fn list(&self) -> Result<Vec<BackupDescriptor>, StoreError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(StoreError::io("failed to read backup root", &self.root, error)),
        };

        let mut backups = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.starts_with(BACKUP_PREFIX) {
                continue;
            }

            let descriptor = if path.is_dir() {
                read_directory_backup(&path, file_name)
            } else if Path::new(file_name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
            {
                read_archived_backup(&path)
            } else {
                continue;
            };

            match descriptor {
                Ok(Some(descriptor)) => backups.push(descriptor),
                Ok(None) => debug!("Skipping {} (no manifest)", path.display()),
                Err(error) => warn!("Skipping {}: {error}", path.display()),
            }
        }

        backups.sort_by(|a, b| b.manifest.timestamp.cmp(&a.manifest.timestamp));
        Ok(backups)
    }

    /// # Errors
    /// Returns an error if the backup root cannot be read.
    pub fn most_recent(&self) -> Result<Option<BackupDescriptor>, StoreError> {
        Ok(self.list()?.into_iter().next())
    }

    /// Find a backup by name; the `backup_` prefix and `.zip` extension are
    /// optional.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] when no backup matches.
    pub fn find(&self, name: &str) -> Result<BackupDescriptor, StoreError> {
        let wanted = name.trim().trim_end_matches(".zip");
        self.list()?
            .into_iter()
            .find(|backup| {
                backup.name == wanted
                    || backup.name.strip_prefix(BACKUP_PREFIX) == Some(wanted)
                    || backup.manifest.backup_name == wanted
            })
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    /// Make `backup` available on disk, extracting archives on first use.
    ///
    /// # Errors
    /// Returns an error if the archive cannot be extracted or the manifest
    /// cannot be read.
    pub fn open(&self, backup: &BackupDescriptor) -> Result<BackupDetails, StoreError> {
        if !backup.is_archived {
            let manifest = read_manifest(&backup.storage_path.join(MANIFEST_FILE))?;
            return Ok(BackupDetails {
                working_dir: backup.storage_path.clone(),
                manifest,
            });
        }

        let working_dir = self.extracted_dir(backup)?;
        let manifest = read_manifest(&working_dir.join(MANIFEST_FILE))?;
        Ok(BackupDetails {
            working_dir,
            manifest,
        })
    }

    fn extracted_dir(&self, backup: &BackupDescriptor) -> Result<PathBuf, StoreError> {
        let mut extracted = self
            .extracted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some((_, dir)) = extracted.get(&backup.storage_path)
            && dir.join(MANIFEST_FILE).is_file()
        {
            return Ok(dir.clone());
        }

        let target = self.extract_root.join(format!("{}_extracted", backup.name));
        if target.exists() {
            remove_path(&target)
                .map_err(|error| StoreError::io("failed to clear extraction directory", &target, error))?;
        }
        std::fs::create_dir_all(&target)
            .map_err(|error| StoreError::io("failed to create extraction directory", &target, error))?;
        debug!("Extracting {} to {}", backup.storage_path.display(), target.display());
        extract_zip(&backup.storage_path, &target)
            .map_err(|error| StoreError::archive(&backup.storage_path, error))?;

        let nested = target.join(&backup.name);
        let working_dir = if nested.join(MANIFEST_FILE).is_file() {
            nested
        } else {
            target.clone()
        };
        extracted.insert(backup.storage_path.clone(), (target, working_dir.clone()));
        Ok(working_dir)
    }

    /// Remove every directory extracted by this store.
    pub fn cleanup_extracted(&self) {
        let mut extracted = self
            .extracted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, (target, _)) in extracted.drain() {
            if let Err(error) = remove_path(&target) {
                warn!("Failed to remove {}: {error}", target.display());
            }
        }
    }
}

fn read_manifest(path: &Path) -> Result<Manifest, StoreError> {
    let data = std::fs::read(path).map_err(|error| StoreError::io("failed to read manifest", path, error))?;
    Manifest::from_slice(&data).map_err(|error| StoreError::Manifest {
        path: path.to_path_buf(),
        details: error.to_string(),
    })
}

fn read_directory_backup(path: &Path, name: &str) -> Result<Option<BackupDescriptor>, StoreError> {
    let manifest_path = path.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Ok(None);
    }
    let manifest = read_manifest(&manifest_path)?;
    Ok(Some(BackupDescriptor::new(
        name.to_string(),
        path.to_path_buf(),
        false,
        manifest,
    )))
}

fn read_archived_backup(path: &Path) -> Result<Option<BackupDescriptor>, StoreError> {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return Ok(None);
    };
    let nested = format!("{stem}/{MANIFEST_FILE}");
    let data = match read_entry(path, &nested).map_err(|error| StoreError::archive(path, error))? {
        Some(data) => data,
        None => match read_entry(path, MANIFEST_FILE).map_err(|error| StoreError::archive(path, error))? {
            Some(data) => data,
            None => return Ok(None),
        },
    };
    let manifest = Manifest::from_slice(&data).map_err(|error| StoreError::Manifest {
        path: path.to_path_buf(),
        details: error.to_string(),
    })?;
    Ok(Some(BackupDescriptor::new(
        stem.to_string(),
        path.to_path_buf(),
        true,
        manifest,
    )))
}
