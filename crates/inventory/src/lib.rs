//! SQLite persistence for the indexer.
//!
//! The inventory is the set of files the library has already indexed. It is
//! only ever written by callers applying a change set; the scan itself only
//! reads a snapshot of it.
//!
//! # Architecture
//! The database stores two entity types:
//! - **Records**: one per indexed file, identified by an opaque id and joined
//!   against scans by path and by content hash (MD5, unique).
//! - **Preferences**: the library roots and MIME allow-list, as JSON string
//!   lists keyed by name.

mod db;
pub mod error;
mod models;
mod preferences;
mod repo;
mod store;

pub use crate::db::Database;
pub use crate::models::{InventoryRecord, MAX_PATH_LENGTH, RecordDraft, RecordId};
pub use crate::preferences::PreferenceRepository;
pub use crate::repo::Repository;
pub use crate::store::{InventoryHandle, InventoryStore, PreferenceHandle, PreferenceStore};
