//! Reconciles the files under the configured library roots against the
//! inventory of files indexed so far.
//!
//! A [scan](scan::scan) walks every root, keeps the files whose MIME type is
//! allowed, fingerprints them, and [classifies](classify()) them against an
//! inventory snapshot. The result is a list of [`ChangeRecord`]s; nothing is
//! written until the caller hands that list to [`apply()`].

mod apply;
mod change;
mod classify;
pub mod error;
pub mod scan;

pub use crate::apply::{ApplySummary, apply};
pub use crate::change::{Ambiguity, ChangeOperation, ChangeRecord};
pub use crate::classify::classify;
use cadence_storage::{FingerprinterHandle, LocalWalker, Md5Fingerprinter, WalkerHandle};
use std::sync::Arc;

/// Default number of files fingerprinted at once.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// The filesystem collaborators of a scan.
///
/// The inventory and preference stores are passed per call instead, so that
/// one context can serve any number of libraries.
#[derive(Clone)]
pub struct Context {
    pub walker: WalkerHandle,
    pub fingerprinter: FingerprinterHandle,
    /// Upper bound on files being fingerprinted at the same time (at least 1).
    pub concurrency: usize,
}
impl Context {
    pub fn new(walker: WalkerHandle, fingerprinter: FingerprinterHandle) -> Self {
        Self {
            walker,
            fingerprinter,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}
impl Default for Context {
    /// Walks the local filesystem and fingerprints with MD5.
    fn default() -> Self {
        Self::new(Arc::new(LocalWalker::new()), Arc::new(Md5Fingerprinter::new()))
    }
}
