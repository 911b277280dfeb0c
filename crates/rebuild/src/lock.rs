use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("another backup or restore is already running")]
    AlreadyRunning,
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl AcquireError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Exclusive lock held for the duration of one backup or restore. Released
/// when dropped.
#[derive(Debug)]
pub struct OperationLock {
    _file: File,
}

impl OperationLock {
    pub fn acquire(lock_file_path: &Path) -> Result<Self, AcquireError> {
        if let Some(parent) = lock_file_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| AcquireError::io("failed to create lock directory", error))?;
        }

        let mut lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_file_path)
            .map_err(|error| AcquireError::io("failed to open operation lock file", error))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(AcquireError::AlreadyRunning);
            }
            Err(error) => {
                // fs2 reports a held lock on Windows as a raw lock violation.
                if error.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                    return Err(AcquireError::AlreadyRunning);
                }
                return Err(AcquireError::io("failed to acquire operation lock", error));
            }
        }

        lock_file
            .set_len(0)
            .and_then(|()| lock_file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| writeln!(lock_file, "{}", std::process::id()))
            .map_err(|error| AcquireError::io("failed to write operation lock metadata", error))?;

        log::debug!("Acquired operation lock {}", lock_file_path.display());
        Ok(Self { _file: lock_file })
    }
}

#[cfg(test)]
mod tests {
    use super::{AcquireError, OperationLock};

    #[test]
    fn acquire_writes_pid_to_lock_file() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("data").join("operation.lock");

        let _lock = OperationLock::acquire(&path).expect("lock should be acquired");

        let contents = std::fs::read_to_string(&path).expect("lock file should be readable");
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn second_acquire_reports_already_running() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("operation.lock");

        let _first = OperationLock::acquire(&path).expect("first lock should be acquired");
        let second = OperationLock::acquire(&path);

        assert!(matches!(second, Err(AcquireError::AlreadyRunning)));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("operation.lock");

        drop(OperationLock::acquire(&path).expect("first lock should be acquired"));

        assert!(OperationLock::acquire(&path).is_ok());
    }
}
