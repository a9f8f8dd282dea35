//! Library Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Each public operation raises its own top-level kind over
//! the error tree of the module that failed.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("library scan failed")]
    Scan,
    #[display("could not apply changes to the inventory")]
    Apply,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// A scan is always safe to repeat; whether repeating helps depends on
    /// the cause further down the tree.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Scan | Self::Apply => false,
        }
    }
}
