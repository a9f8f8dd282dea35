use crate::error::{Error, ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use time::UtcDateTime;

/// Longest path (in bytes) the inventory accepts.
pub const MAX_PATH_LENGTH: usize = 4096;
const CONTENT_HASH_LENGTH: usize = 32;

/// Opaque, stable identifier assigned by the inventory when a record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(i64);
impl RecordId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}
impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{}", self.0)
    }
}

/// A previously indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InventoryRecord {
    pub id: RecordId,
    /// Absolute path of the file when it was last indexed
    pub path: PathBuf,
    /// MD5 of the file content; unique across the inventory
    pub content_hash: String,
    pub size: u64,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}
impl InventoryRecord {
    /// Start an update of this record.
    pub fn to_draft(&self) -> RecordDraft {
        RecordDraft {
            id: Some(self.id),
            path: self.path.clone(),
            content_hash: self.content_hash.clone(),
            size: self.size,
        }
    }
}

/// The writable part of an [`InventoryRecord`].
///
/// Without an `id` the draft is inserted as a new record, otherwise it
/// replaces the fields of the record with that `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub id: Option<RecordId>,
    pub path: PathBuf,
    pub content_hash: String,
    pub size: u64,
}
impl RecordDraft {
    pub fn new(path: impl Into<PathBuf>, content_hash: impl Into<String>, size: u64) -> Self {
        Self { id: None, path: path.into(), content_hash: content_hash.into(), size }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_content_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = content_hash.into();
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Required-field, max-length and format checks.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field, reason| ErrorKind::Validation { field, reason };
        let path = self.path.to_str().ok_or_raise(|| invalid("path", "not valid UTF-8"))?;
        if path.is_empty() {
            exn::bail!(invalid("path", "required"));
        }
        if path.len() > MAX_PATH_LENGTH {
            exn::bail!(invalid("path", "too long"));
        }
        if self.content_hash.is_empty() {
            exn::bail!(invalid("content hash", "required"));
        }
        if self.content_hash.len() != CONTENT_HASH_LENGTH
            || !self.content_hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            exn::bail!(invalid("content hash", "expected 32 lowercase hex characters"));
        }
        if i64::try_from(self.size).is_err() {
            exn::bail!(invalid("size", "too large"));
        }
        Ok(())
    }
}

pub(crate) fn path_to_string(path: impl AsRef<Path>) -> Result<String> {
    Ok(path.as_ref().to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
}

#[derive(sqlx::FromRow)]
pub(crate) struct RecordRow {
    id: i64,
    path: String,
    content_hash: String,
    size: i64,
    created_at: i64,
    updated_at: i64,
}
impl TryFrom<RecordRow> for InventoryRecord {
    type Error = Error;
    fn try_from(row: RecordRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: RecordId(row.id),
            path: PathBuf::from(row.path),
            content_hash: row.content_hash,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("update date"))?,
        })
    }
}
