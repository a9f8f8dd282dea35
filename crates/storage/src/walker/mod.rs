//! Directory walker trait and implementations.
//!
//! A [`Walker`] enumerates every regular file beneath a library root. Walks
//! are stateless: each call re-reads the tree from scratch, so a walker can be
//! shared across scans and across roots.

mod local;

pub use self::local::LocalWalker;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Recursive, restartable file enumeration.
///
/// # Errors
/// An I/O error anywhere in the tree is yielded as an `Err` item. Consumers
/// that need a complete picture of the tree (the scan orchestrator does)
/// must stop at the first error: a skipped subtree is indistinguishable from
/// a deleted one.
///
/// # Examples
///
/// ```no_run
/// use futures::TryStreamExt;
/// use std::path::Path;
/// # use cadence_storage::{Walker, error::Result};
/// # async fn example(walker: &dyn Walker) -> Result<()> {
/// let mut stream = walker.walk(Path::new("/srv/music"));
/// while let Some(file) = stream.try_next().await? {
///     println!("{}: {} bytes ({:?})", file.path.display(), file.size, file.mime_type);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Walker: Send + Sync {
    /// Stream every file beneath `root`, depth-first.
    ///
    /// Paths yielded are absolute (`root` joined with the relative location).
    fn walk<'a>(&'a self, root: &'a Path) -> FileInfoStream<'a>;

    /// Collect the whole walk into a [`Vec`], failing on the first error.
    async fn walk_all(&self, root: &Path) -> Result<Vec<FileInfo>> {
        self.walk(root).try_collect().await
    }
}
