//! Library root validation.
//!
//! A root is only accepted into configuration (and only walked during a scan)
//! when it exists, is a directory, and can be listed by this process.

use crate::error::{ErrorKind, Result};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

/// Validates that `path` can be used as a library root.
///
/// Checks are performed in order, and the first failure wins:
/// 1. [`PathNotExisting`](ErrorKind::PathNotExisting) if `stat` reports not-found,
/// 2. [`PathNotADirectory`](ErrorKind::PathNotADirectory) if it is anything but a directory,
/// 3. [`PathNotReadable`](ErrorKind::PathNotReadable) if the directory cannot be listed.
///
/// Symlinks are followed. Readability is tested by opening the directory for
/// listing rather than with an `access(2)`-style check, so the answer is the
/// same one the walker will get.
///
/// # Examples
///
/// ```
/// use cadence_storage::validate_root;
/// let temp = std::env::temp_dir();
/// assert!(validate_root(&temp).is_ok());
/// assert!(validate_root(temp.join("definitely/not/here")).is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == IoErrorKind::NotFound => exn::bail!(ErrorKind::PathNotExisting(path.to_path_buf())),
        Err(e) if e.kind() == IoErrorKind::PermissionDenied => {
            exn::bail!(ErrorKind::PathNotReadable(path.to_path_buf()))
        },
        Err(e) => exn::bail!(ErrorKind::Io(e)),
    };
    if !metadata.is_dir() {
        exn::bail!(ErrorKind::PathNotADirectory(path.to_path_buf()));
    }
    match std::fs::read_dir(path) {
        Ok(_) => Ok(path.to_path_buf()),
        Err(e) if e.kind() == IoErrorKind::PermissionDenied => exn::bail!(ErrorKind::PathNotReadable(path.to_path_buf())),
        // Vanished between the two syscalls.
        Err(e) if e.kind() == IoErrorKind::NotFound => exn::bail!(ErrorKind::PathNotExisting(path.to_path_buf())),
        Err(e) => exn::bail!(ErrorKind::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_eq!(validate(temp_dir.path()).unwrap(), temp_dir.path());
    }

    #[test]
    fn test_missing_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("nope");
        let err = validate(&missing).unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathNotExisting(p) if *p == missing));
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("track.mp3");
        std::fs::write(&file, b"ID3").unwrap();
        let err = validate(&file).unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathNotADirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = tempfile::tempdir().unwrap();
        let locked = temp_dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        let bypassed = std::fs::read_dir(&locked).is_ok();
        let result = validate(&locked);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        if bypassed {
            // Running with elevated privileges; permission bits are not enforced.
            assert!(result.is_ok());
        } else {
            assert!(matches!(&*result.unwrap_err(), ErrorKind::PathNotReadable(_)));
        }
    }
}
