//! File descriptors produced by the walker and completed by the fingerprinter.

use std::{ops::Deref, path::PathBuf};

// The typestate keeps "has this file been hashed yet?" out of runtime checks:
// the classifier only accepts `FileInfo<Fingerprinted>`. Mixed collections
// have to deref to `FileMeta`.

/// File metadata returned by a [`Walker`](crate::Walker).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileMeta {
    /// Absolute path of the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// MIME type guessed from the file name, `None` when unknown
    pub mime_type: Option<String>,
}
impl FileMeta {
    pub fn with_hash(self, hash: impl Into<String>) -> FileInfo<Fingerprinted> {
        FileInfo { meta: self, content_hash: hash.into() }
    }
}

mod sealed {
    pub trait Sealed {}
}
pub trait HashState: sealed::Sealed {
    type Hash: std::fmt::Debug + Clone + PartialEq + Eq + std::hash::Hash;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Discovered;
impl sealed::Sealed for Discovered {}
impl HashState for Discovered {
    type Hash = ();
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprinted;
impl sealed::Sealed for Fingerprinted {}
impl HashState for Fingerprinted {
    type Hash = String;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileInfo<S: HashState = Discovered> {
    meta: FileMeta,
    /// Lowercase hex MD5 of the file content (only once fingerprinted)
    pub content_hash: S::Hash,
}
impl<S: HashState> FileInfo<S> {
    // Explicit version of self.as_deref()
    pub fn meta(&self) -> &FileMeta {
        &self.meta
    }

    pub fn into_meta(self) -> FileMeta {
        self.meta
    }
}
impl<S: HashState> Deref for FileInfo<S> {
    type Target = FileMeta;
    fn deref(&self) -> &FileMeta {
        &self.meta
    }
}

impl FileInfo {
    /// Create a new FileInfo from a walk (no hash yet).
    pub fn new(path: impl Into<PathBuf>, size: u64, mime_type: Option<String>) -> Self {
        FileMeta { path: path.into(), size, mime_type }.into()
    }

    pub fn with_hash(self, hash: impl Into<String>) -> FileInfo<Fingerprinted> {
        self.meta.with_hash(hash)
    }
}
impl From<FileMeta> for FileInfo<Discovered> {
    fn from(meta: FileMeta) -> Self {
        Self { meta, content_hash: () }
    }
}
