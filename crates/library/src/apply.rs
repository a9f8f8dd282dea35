//! Persisting a classified change set.

use crate::change::{ChangeOperation, ChangeRecord};
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use cadence_inventory::InventoryStore;
use exn::ResultExt;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::instrument;

/// Counts of what [`apply`] wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub moved: usize,
    pub deleted: usize,
    /// Unchanged and unsupported changes, which are never written.
    pub skipped: usize,
}
impl ApplySummary {
    pub fn written(&self) -> usize {
        self.created + self.updated + self.moved + self.deleted
    }
}
impl Display for ApplySummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} created, {} updated, {} moved, {} deleted, {} skipped",
            self.created, self.updated, self.moved, self.deleted, self.skipped,
        )
    }
}

/// Deletions free paths and content hashes, so they go first; re-pointed
/// records go before brand new ones for the same reason.
fn phase(operation: ChangeOperation) -> u8 {
    match operation {
        ChangeOperation::Deleted => 0,
        ChangeOperation::Updated | ChangeOperation::Moved => 1,
        _ => 2,
    }
}

/// Replays a change set onto `store`.
///
/// The first failed write aborts; writes already made stay in place; the next
/// scan picks up from wherever the inventory was left.
#[instrument(skip_all, fields(changes = changes.len()))]
pub async fn apply(store: &dyn InventoryStore, changes: &[ChangeRecord]) -> LibraryResult<ApplySummary> {
    let mut writes: Vec<&ChangeRecord> = changes.iter().filter(|change| change.operation().is_write()).collect();
    writes.sort_by_key(|change| phase(change.operation()));

    let mut summary = ApplySummary {
        skipped: changes.len() - writes.len(),
        ..ApplySummary::default()
    };
    for change in writes {
        match change {
            ChangeRecord::Deleted { record } => {
                store.delete(record).await.or_raise(|| LibraryErrorKind::Apply)?;
                summary.deleted += 1;
            },
            ChangeRecord::Created { .. } | ChangeRecord::Updated { .. } | ChangeRecord::Moved { .. } => {
                let Some(draft) = change.draft() else {
                    continue;
                };
                let record = store.save_or_update(draft).await.or_raise(|| LibraryErrorKind::Apply)?;
                tracing::debug!(operation = %change.operation(), record = %record.id, path = %record.path.display(), "Applied change");
                match change.operation() {
                    ChangeOperation::Created => summary.created += 1,
                    ChangeOperation::Updated => summary.updated += 1,
                    _ => summary.moved += 1,
                }
            },
            ChangeRecord::Unchanged { .. } | ChangeRecord::Unsupported { .. } => {},
        }
    }
    tracing::info!(%summary, "Changes applied");
    Ok(summary)
}
