//! Inventory Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::models::RecordId;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// An inventory error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for inventory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// Stored data could not be converted back into a model.
    #[display("invalid inventory data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// A record failed required-field or max-length validation.
    #[display("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },
    /// Another record already tracks this content hash.
    #[display("content hash already tracked by another record: {_0}")]
    Conflict(#[error(not(source))] String),
    #[display("record not found: {_0}")]
    RecordNotFound(#[error(not(source))] RecordId),
    /// A library root failed validation; the storage error is the child.
    #[display("invalid library root")]
    Root,
    #[display("library root already configured: {}", _0.display())]
    RootAlreadyConfigured(#[error(not(source))] PathBuf),
    #[display("library root not configured: {}", _0.display())]
    RootNotConfigured(#[error(not(source))] PathBuf),
    #[display("MIME type already configured: {_0}")]
    MimeTypeAlreadyConfigured(#[error(not(source))] String),
    #[display("MIME type not configured: {_0}")]
    MimeTypeNotConfigured(#[error(not(source))] String),
    #[display("invalid MIME type: {_0}")]
    InvalidMimeType(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // SQLITE_BUSY surfaces as a database error.
        matches!(self, Self::Database)
    }

    /// Returns `true` for errors caused by the caller's input rather than by
    /// the database.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::Conflict(_)
                | Self::RecordNotFound(_)
                | Self::Root
                | Self::RootAlreadyConfigured(_)
                | Self::RootNotConfigured(_)
                | Self::MimeTypeAlreadyConfigured(_)
                | Self::MimeTypeNotConfigured(_)
                | Self::InvalidMimeType(_)
        )
    }
}
