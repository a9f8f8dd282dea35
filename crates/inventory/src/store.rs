//! Collaborator interfaces consumed by the scan orchestrator.
//!
//! The orchestrator only ever talks to these traits, so the SQLite
//! implementations in this crate can be swapped out without touching the
//! reconciliation logic.

use crate::error::Result;
use crate::models::{InventoryRecord, RecordDraft};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type InventoryHandle = Arc<dyn InventoryStore>;
pub type PreferenceHandle = Arc<dyn PreferenceStore>;

/// Persisted set of previously indexed files.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Snapshot of every record.
    async fn get_all_records(&self) -> Result<Vec<InventoryRecord>>;

    /// Insert (no `id`) or update (with `id`) a record.
    ///
    /// Rejects drafts failing [`RecordDraft::validate`], and drafts whose
    /// content hash already belongs to a different record
    /// ([`Conflict`](crate::error::ErrorKind::Conflict)).
    async fn save_or_update(&self, draft: RecordDraft) -> Result<InventoryRecord>;

    /// Delete a record, returning it as it was stored.
    async fn delete(&self, record: &InventoryRecord) -> Result<InventoryRecord>;
}

/// Library roots and the MIME allow-list.
///
/// Both are ordered, duplicate-free string lists. Mutations are validated in
/// full before anything is written: a rejected call leaves the store exactly
/// as it was.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Configured library roots; empty when never configured.
    async fn library_roots(&self) -> Result<Vec<PathBuf>>;

    async fn add_library_root(&self, root: &Path) -> Result<Vec<PathBuf>>;

    async fn remove_library_root(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Replace all roots. Duplicates are dropped, keeping the first occurrence.
    async fn set_library_roots(&self, roots: &[PathBuf]) -> Result<Vec<PathBuf>>;

    /// Allowed MIME types (lowercase essences); empty when never configured.
    async fn mime_types(&self) -> Result<Vec<String>>;

    async fn add_mime_type(&self, mime: &str) -> Result<Vec<String>>;

    async fn remove_mime_type(&self, mime: &str) -> Result<Vec<String>>;

    /// Replace the allow-list. Duplicates are dropped, keeping the first occurrence.
    async fn set_mime_types(&self, mimes: &[String]) -> Result<Vec<String>>;
}
