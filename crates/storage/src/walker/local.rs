//! Local filesystem walker.

use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::mime;
use crate::walker::{FileInfoStream, Walker};
use async_stream::stream;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Walks directories on the local filesystem using `tokio::fs`.
///
/// Symlinks are not followed: a symlinked file or directory is skipped, which
/// also rules out cycles.
#[derive(Clone, Debug, Default)]
pub struct LocalWalker;

impl LocalWalker {
    pub fn new() -> Self {
        Self
    }

    async fn process_entry(entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| ErrorKind::from_io(e, &path))?;
        if file_type.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if file_type.is_file() {
            let metadata = entry.metadata().await.map_err(|e| ErrorKind::from_io(e, &path))?;
            let mime_type = mime::detect(&path);
            return Ok(WalkEntry::File(FileInfo::new(path, metadata.len(), mime_type)));
        }
        tracing::debug!(path = %path.display(), "skipping entry that is not a regular file or directory");
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl Walker for LocalWalker {
    fn walk<'a>(&'a self, root: &'a Path) -> FileInfoStream<'a> {
        let mut stack = vec![root.to_path_buf()];

        Box::pin(stream! {
            while let Some(current) = stack.pop() {
                tracing::trace!(directory = %current.display(), "descending");
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // Unlike a storage listing, a directory vanishing mid-walk
                    // is an error: the caller must not mistake it for deletions.
                    Err(e) => {
                        yield Err(exn::Exn::from(ErrorKind::from_io(e, &current)));
                        return;
                    },
                };
                // Sorted so that walks of an unchanged tree are reproducible.
                let mut children = Vec::new();
                loop {
                    match entries.next_entry().await {
                        Ok(Some(entry)) => children.push(entry),
                        Ok(None) => break,
                        Err(e) => {
                            yield Err(exn::Exn::from(ErrorKind::from_io(e, &current)));
                            return;
                        },
                    }
                }
                children.sort_by_key(|entry| std::cmp::Reverse(entry.file_name()));
                let mut descend = Vec::new();
                for entry in children {
                    match Self::process_entry(entry).await {
                        Ok(WalkEntry::File(file)) => yield Ok(file),
                        Ok(WalkEntry::Descend(dir)) => descend.push(dir),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => {
                            yield Err(e);
                            return;
                        },
                    }
                }
                // Children were visited in reverse, so push directories back in
                // the same order to pop them alphabetically.
                stack.extend(descend);
            }
        })
    }
}
