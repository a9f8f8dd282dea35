//! Filesystem side of the indexer: which directories may be library roots,
//! which files live beneath them, what they are, and what they contain.

pub mod error;
pub mod file;
mod fingerprint;
pub mod mime;
mod path;
mod walker;

pub use crate::file::{FileInfo, FileMeta};
pub use crate::fingerprint::{Fingerprinter, Md5Fingerprinter, Source, fingerprint_bytes};
pub use crate::path::validate as validate_root;
pub use crate::walker::{FileInfoStream, LocalWalker, Walker};
use std::sync::Arc;

pub type WalkerHandle = Arc<dyn Walker>;
pub type FingerprinterHandle = Arc<dyn Fingerprinter>;

/// A fingerprinted file: the unit handed to the change classifier.
pub type ScannedFile = FileInfo<file::Fingerprinted>;
