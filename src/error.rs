//! Command-line Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A command-line error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for command-line operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not initialise logging")]
    Logging,
    #[display("could not open inventory database")]
    Database,
    #[display("could not update library preferences")]
    Preferences,
    #[display("scan failed")]
    Scan,
    #[display("could not resolve path: {}", _0.display())]
    Path(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
