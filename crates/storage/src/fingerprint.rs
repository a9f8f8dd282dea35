//! Content fingerprinting.
//!
//! MD5 is used purely as a change detector: it is fast, and collision
//! resistance against adversarial input is not something the inventory relies
//! on.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::Path;
use tracing::instrument;

/// What to fingerprint.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// Read the whole file into memory, then hash it.
    Path(&'a Path),
    /// Hash an in-memory buffer.
    Bytes(&'a [u8]),
}
impl<'a> From<&'a Path> for Source<'a> {
    fn from(path: &'a Path) -> Self {
        Self::Path(path)
    }
}
impl<'a> From<&'a [u8]> for Source<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Bytes(bytes)
    }
}

/// Computes content digests.
///
/// Implementations must be deterministic and side-effect free so that files
/// can be fingerprinted concurrently in any order.
#[async_trait]
pub trait Fingerprinter: Send + Sync {
    /// Returns the lowercase hex digest of the source's content.
    ///
    /// A source that cannot be read fails the call; there is no retry.
    async fn fingerprint(&self, source: Source<'_>) -> Result<String>;
}

/// MD5 digest of a byte buffer as 32 lowercase hex characters.
pub fn fingerprint_bytes(bytes: impl AsRef<[u8]>) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// [`Fingerprinter`] producing MD5 digests.
///
/// Files are read with `tokio::fs` and hashed on the blocking thread pool so
/// that large files don't stall the runtime.
#[derive(Clone, Debug, Default)]
pub struct Md5Fingerprinter;

impl Md5Fingerprinter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Fingerprinter for Md5Fingerprinter {
    #[instrument(level = "trace", skip(self))]
    async fn fingerprint(&self, source: Source<'_>) -> Result<String> {
        match source {
            Source::Bytes(bytes) => Ok(fingerprint_bytes(bytes)),
            Source::Path(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
                tokio::task::spawn_blocking(move || fingerprint_bytes(bytes)).await.or_raise(|| ErrorKind::Task)
            },
        }
    }
}
