use std::path::{Path, PathBuf};

use rebuild_platform::CommandError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate catalog entry: {name}")]
    Duplicate { name: String },

    #[error("{tool}: pattern has more than one wildcard: {pattern}")]
    MultipleWildcards { tool: String, pattern: String },
}

/// An unexpected failure while capturing a single artifact. Expected absence
/// (missing paths, locked files, unknown registry keys) is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("IO error ({kind}) at {path}: {message}")]
    Io {
        path: PathBuf,
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl CaptureError {
    pub(crate) fn io(path: &Path, error: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("invalid backup name: {name}")]
    InvalidName { name: String },

    #[error("{context} ({path}): {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write archive {path}: {details}")]
    Archive { path: PathBuf, details: String },
}

impl BackupError {
    pub(crate) fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context} ({path}): {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive {path}: {details}")]
    Archive { path: PathBuf, details: String },

    #[error("manifest {path} is unreadable: {details}")]
    Manifest { path: PathBuf, details: String },

    #[error("backup not found: {name}")]
    NotFound { name: String },
}

impl StoreError {
    pub(crate) fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn archive(path: &Path, details: impl std::fmt::Display) -> Self {
        Self::Archive {
            path: path.to_path_buf(),
            details: details.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectError {
    #[error("detection script not found: {path}")]
    ScriptMissing { path: PathBuf },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("detection script failed: {stderr}")]
    Failed { stderr: String },

    #[error("detection output is not valid JSON: {details}")]
    Parse { details: String },
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{CaptureError, DetectError, StoreError};

    #[test]
    fn capture_io_error_keeps_kind_and_path() {
        let error = CaptureError::io(
            Path::new("vscode"),
            &std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(
            error,
            CaptureError::Io {
                kind: std::io::ErrorKind::PermissionDenied,
                ..
            }
        ));
        assert!(error.to_string().contains("vscode"));
    }

    #[test]
    fn detect_error_wraps_command_errors_transparently() {
        let error = DetectError::from(rebuild_platform::CommandError::not_found("powershell"));
        assert_eq!(error.to_string(), "powershell not found");
    }

    #[test]
    fn store_archive_error_display_includes_details() {
        let error = StoreError::archive(Path::new("backup_1.zip"), "invalid zip header");
        assert_eq!(
            error.to_string(),
            "archive backup_1.zip: invalid zip header"
        );
    }
}
