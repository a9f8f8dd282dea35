//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Library root does not exist.
    #[display("path does not exist: {}", _0.display())]
    PathNotExisting(#[error(not(source))] PathBuf),
    /// Library root exists but is a file (or something else that isn't a directory).
    #[display("path is not a directory: {}", _0.display())]
    PathNotADirectory(#[error(not(source))] PathBuf),
    /// Library root exists but the process may not list its contents.
    #[display("path is not readable: {}", _0.display())]
    PathNotReadable(#[error(not(source))] PathBuf),
    /// File or directory vanished while it was being read.
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied while reading a file or directory.
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Value is not a `type/subtype` MIME essence.
    #[display("invalid MIME type: {_0}")]
    InvalidMimeType(#[error(not(source))] String),
    /// A blocking hashing task panicked or was cancelled.
    #[display("background task failed")]
    Task,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::NotFound(_) | Self::Task)
    }

    /// Map an I/O error that happened while touching `path` to the most
    /// specific kind available.
    pub fn from_io(err: IoError, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.into()),
            _ => Self::Io(err),
        }
    }
}
