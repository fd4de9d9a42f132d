//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents, mapping failures to `internal.io_error`.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        Error::internal_io(
            format!("{}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Write content to file atomically (write to .tmp, then rename).
///
/// Missing parent directories are created first.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let filename = path.file_name().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    if !parent.as_os_str().is_empty() {
        ensure_dir(parent, operation)?;
    }

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));

    fs::write(&tmp_path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} (write temp)", operation)))
    })?;

    fs::rename(&tmp_path, path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (rename)", operation))))?;

    Ok(())
}

pub fn ensure_dir(dir: &Path, operation: &str) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            Error::internal_io(
                format!("cannot create directory {}: {}", dir.display(), e),
                Some(operation.to_string()),
            )
        })?;
    }
    Ok(())
}

/// Remove a directory tree; a missing directory is not an error.
pub fn remove_dir_all(dir: &Path, operation: &str) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::internal_io(
            format!("cannot delete {}: {}", dir.display(), e),
            Some(operation.to_string()),
        )),
    }
}

pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let err = read_file(Path::new("/nonexistent/path.txt"), "test read").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn write_file_atomic_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("apps").join("generated").join("values.yaml");

        write_file_atomic(&path, "namespaces:\n- foo\n", "test write").unwrap();

        assert_eq!(read_file(&path, "test read").unwrap(), "namespaces:\n- foo\n");
        assert!(!path.with_file_name("values.yaml.tmp").exists());
    }

    #[test]
    fn remove_dir_all_ignores_missing_dir() {
        let dir = tempdir().unwrap();
        remove_dir_all(&dir.path().join("generated"), "cleanup").unwrap();
    }
}
