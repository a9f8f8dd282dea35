//! Error types for the [`scan`](super) module.

use derive_more::{Display, Error};

/// A scan error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the phase of the scan that failed.
///
/// Every variant is fatal to the scan: no partial change set is ever returned,
/// since files that were skipped would be indistinguishable from files that
/// were deleted.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The library roots or MIME allow-list could not be read.
    #[display("could not load library preferences")]
    Preferences,
    /// A configured root no longer passes validation.
    #[display("library root is no longer usable")]
    Root,
    /// Listing a root's subtree failed part way through.
    #[display("could not walk library root")]
    Walk,
    #[display("could not fingerprint file")]
    Fingerprint,
    /// The inventory snapshot could not be read.
    #[display("could not load inventory")]
    Inventory,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Inventory | Self::Preferences)
    }
}
