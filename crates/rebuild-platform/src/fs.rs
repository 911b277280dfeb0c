use std::io::Write;
use std::path::Path;

/// Write `data` to `path` so readers only ever observe the old or the new
/// contents. The data lands in a sibling temp file first and is then moved
/// over the destination.
///
/// # Errors
/// Returns an error if the temp file cannot be written or the final replace
/// fails. The temp file is removed on failure.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "target path has no parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("data");

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    let tmp_path = tmp.into_temp_path().keep().map_err(|error| error.error)?;

    if let Err(error) = replace_file(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(error);
    }

    Ok(())
}

/// Move `src` over `dst`, replacing any existing file.
///
/// # Errors
/// Returns the OS error when the move fails.
pub fn replace_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{
            MOVEFILE_REPLACE_EXISTING, MOVEFILE_WRITE_THROUGH, MoveFileExW,
        };

        let wide = |path: &Path| -> Vec<u16> {
            path.as_os_str()
                .encode_wide()
                .chain(std::iter::once(0))
                .collect()
        };
        let src_utf16 = wide(src);
        let dst_utf16 = wide(dst);

        // SAFETY: both buffers are NUL-terminated UTF-16 and outlive the call.
        let moved = unsafe {
            MoveFileExW(
                src_utf16.as_ptr(),
                dst_utf16.as_ptr(),
                MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH,
            )
        };
        if moved != 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::fs::rename(src, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::write_atomic;

    #[test]
    fn write_atomic_replaces_existing_contents_without_leftovers() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("manifest.json");
        std::fs::write(&path, "old").expect("seed file should be written");

        write_atomic(&path, b"new").expect("atomic write should succeed");

        assert_eq!(
            std::fs::read_to_string(&path).expect("file should be readable"),
            "new"
        );
        let leftovers = std::fs::read_dir(temp_dir.path())
            .expect("read temp dir entries")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn write_atomic_creates_missing_parent_directories() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("nested").join("cache.json");

        write_atomic(&path, b"{}").expect("atomic write should succeed");

        assert!(path.is_file());
    }
}
