//! The classifier's output: one [`ChangeRecord`] per scanned file, plus one
//! per inventory record that no longer exists anywhere in the scanned tree.

use cadence_inventory::{InventoryRecord, RecordDraft};
use cadence_storage::ScannedFile;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

/// What the caller should do with the inventory for one change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeOperation {
    /// File unchanged at its known location.
    None,
    /// Genuinely new file.
    Created,
    /// Same location, new content.
    Updated,
    /// Known content found at a different location.
    Moved,
    /// Tracked file no longer exists in the scanned tree.
    Deleted,
    /// Ambiguous identity; needs an operator.
    Unsupported,
}
impl ChangeOperation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Moved => "MOVED",
            Self::Deleted => "DELETED",
            Self::Unsupported => "UNSUPPORTED",
        }
    }

    /// Returns `true` if applying this operation writes to the inventory.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Moved | Self::Deleted)
    }
}
impl Display for ChangeOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.pad(self.as_str())
    }
}

/// Why a scanned file could not be classified automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ambiguity {
    /// The file sits at one record's path but carries another record's content.
    IdentityCollision,
    /// Several scanned files share this content hash, so at most one of them
    /// could own it in the inventory.
    DuplicateContent,
    /// The file carries a record's content, but that record is also being
    /// rewritten in place at its original path.
    ContestedRecord,
    /// The path is not valid UTF-8, so the inventory cannot store it.
    UnrepresentablePath,
}

/// A single classified outcome of reconciling a scan against the inventory.
///
/// Variants keep the inventory record(s) the file was matched against, so the
/// caller can apply the change without looking anything up again.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChangeRecord {
    Unchanged {
        file: ScannedFile,
        record: InventoryRecord,
    },
    Created {
        file: ScannedFile,
    },
    Updated {
        file: ScannedFile,
        record: InventoryRecord,
    },
    Moved {
        file: ScannedFile,
        record: InventoryRecord,
    },
    Deleted {
        record: InventoryRecord,
    },
    Unsupported {
        file: ScannedFile,
        reason: Ambiguity,
        by_path: Option<InventoryRecord>,
        by_hash: Option<InventoryRecord>,
    },
}
impl ChangeRecord {
    pub fn operation(&self) -> ChangeOperation {
        match self {
            Self::Unchanged { .. } => ChangeOperation::None,
            Self::Created { .. } => ChangeOperation::Created,
            Self::Updated { .. } => ChangeOperation::Updated,
            Self::Moved { .. } => ChangeOperation::Moved,
            Self::Deleted { .. } => ChangeOperation::Deleted,
            Self::Unsupported { .. } => ChangeOperation::Unsupported,
        }
    }

    /// The scanned file this change is about (everything but [`Deleted`](Self::Deleted)).
    pub fn file(&self) -> Option<&ScannedFile> {
        match self {
            Self::Unchanged { file, .. }
            | Self::Created { file }
            | Self::Updated { file, .. }
            | Self::Moved { file, .. }
            | Self::Unsupported { file, .. } => Some(file),
            Self::Deleted { .. } => None,
        }
    }

    /// The inventory record the operation applies to, if there is exactly one.
    pub fn record(&self) -> Option<&InventoryRecord> {
        match self {
            Self::Unchanged { record, .. }
            | Self::Updated { record, .. }
            | Self::Moved { record, .. }
            | Self::Deleted { record } => Some(record),
            Self::Created { .. } | Self::Unsupported { .. } => None,
        }
    }

    /// Path of the scanned file, or of the deleted record.
    pub fn path(&self) -> &Path {
        match self {
            Self::Unchanged { file, .. }
            | Self::Created { file }
            | Self::Updated { file, .. }
            | Self::Moved { file, .. }
            | Self::Unsupported { file, .. } => &file.path,
            Self::Deleted { record } => &record.path,
        }
    }

    /// The inventory write for `Created`, `Updated` and `Moved` changes.
    pub fn draft(&self) -> Option<RecordDraft> {
        match self {
            Self::Created { file } => Some(RecordDraft::new(file.path.clone(), file.content_hash.clone(), file.size)),
            Self::Updated { file, record } => {
                Some(record.to_draft().with_content_hash(file.content_hash.clone()).with_size(file.size))
            },
            Self::Moved { file, record } => Some(record.to_draft().with_path(file.path.clone()).with_size(file.size)),
            Self::Unchanged { .. } | Self::Deleted { .. } | Self::Unsupported { .. } => None,
        }
    }
}
impl Display for ChangeRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Moved { file, record } => {
                write!(f, "{:<11}  {} (from {})", self.operation(), file.path.display(), record.path.display())
            },
            Self::Deleted { record } => write!(f, "{:<11}  {} ({})", self.operation(), record.path.display(), record.id),
            Self::Unsupported { file, reason, .. } => {
                write!(f, "{:<11}  {} ({reason:?})", self.operation(), file.path.display())
            },
            _ => write!(f, "{:<11}  {}", self.operation(), self.path().display()),
        }
    }
}
