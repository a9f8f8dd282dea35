use crate::Context;
use crate::change::ChangeRecord;
use crate::classify::classify;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::scan::error::{ErrorKind as ScanErrorKind, Result as ScanResult};
use async_stream::stream;
use cadence_inventory::{InventoryStore, PreferenceStore};
use cadence_storage::{FileInfo, ScannedFile, Source, validate_root};
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Progress events emitted by [`scan_events`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) — exactly once.
/// 2. [`RootsResolved`](Self::RootsResolved) — once, unless no roots are
///    configured.
/// 3. [`DiscoveryComplete`](Self::DiscoveryComplete) — once, with the number
///    of files that passed the MIME allow-list.
/// 4. [`Fingerprinted`](Self::Fingerprinted) — once per discovered file, in
///    completion order.
/// 5. [`Classified`](Self::Classified) — exactly once, with the change set.
/// 6. [`Complete`](Self::Complete) — exactly once.
///
/// Any error terminates the stream; neither [`Classified`](Self::Classified)
/// nor [`Complete`](Self::Complete) follow it.
#[derive(Debug)]
pub enum ScanEvent {
    Started,
    /// Number of configured roots about to be walked.
    RootsResolved(u64),
    DiscoveryComplete(u64),
    Fingerprinted(PathBuf),
    Classified(Vec<ChangeRecord>),
    Complete,
}

/// Streams [`ScanEvent`]s for one scan of the configured library roots.
///
/// Roots and the MIME allow-list are read from `preferences` when the stream
/// is first polled. Each root is re-validated, then all roots are walked
/// concurrently. Allowed files are fingerprinted up to `ctx.concurrency` at a
/// time before the `inventory` snapshot is read and classified against.
///
/// With no roots configured the scan succeeds with an empty change set, and
/// the inventory is never read.
pub fn scan_events<'a>(
    ctx: &'a Context,
    inventory: &'a dyn InventoryStore,
    preferences: &'a dyn PreferenceStore,
) -> impl Stream<Item = LibraryResult<ScanEvent>> + 'a {
    // `rustfmt` does not format macro-specific syntax such as
    // `for await` even using the parentheses trick.
    stream! {
        for await event in scan_inner(ctx, inventory, preferences) {
            yield event.or_raise(|| LibraryErrorKind::Scan);
        }
    }
}

/// Runs a whole scan and returns the classified change set.
pub async fn scan(
    ctx: &Context,
    inventory: &dyn InventoryStore,
    preferences: &dyn PreferenceStore,
) -> LibraryResult<Vec<ChangeRecord>> {
    let mut events = std::pin::pin!(scan_events(ctx, inventory, preferences));
    let mut changes = Vec::new();
    while let Some(event) = events.next().await {
        if let ScanEvent::Classified(classified) = event? {
            changes = classified;
        }
    }
    Ok(changes)
}

fn scan_inner<'a>(
    ctx: &'a Context,
    inventory: &'a dyn InventoryStore,
    preferences: &'a dyn PreferenceStore,
) -> impl Stream<Item = ScanResult<ScanEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(ScanEvent::Started);

        let roots = match preferences.library_roots().await.or_raise(|| ScanErrorKind::Preferences) {
            Ok(roots) => roots,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        if roots.is_empty() {
            tracing::info!("No library roots configured, nothing to scan");
            yield Ok(ScanEvent::Classified(Vec::new()));
            yield Ok(ScanEvent::Complete);
            return;
        }
        let mime_types = match preferences.mime_types().await.or_raise(|| ScanErrorKind::Preferences) {
            Ok(mime_types) => mime_types,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        if mime_types.is_empty() {
            tracing::warn!("MIME allow-list is empty, every file will be filtered out");
        }
        yield Ok(ScanEvent::RootsResolved(u64::try_from(roots.len()).unwrap_or(u64::MAX)));

        let files = match discover(ctx, &roots, &mime_types).await {
            Ok(files) => files,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        yield Ok(ScanEvent::DiscoveryComplete(u64::try_from(files.len()).unwrap_or(u64::MAX)));

        let mut scanned = Vec::with_capacity(files.len());
        let mut pending = files.into_iter().map(|file| fingerprint(ctx, file));
        let mut processing = FuturesUnordered::new();
        processing.extend(pending.by_ref().take(ctx.concurrency.max(1)));
        while let Some(result) = processing.next().await {
            match result {
                Ok(file) => {
                    yield Ok(ScanEvent::Fingerprinted(file.path.clone()));
                    scanned.push(file);
                },
                Err(e) => {
                    yield Err(e);
                    return;
                },
            }
            if let Some(next) = pending.next() {
                processing.push(next);
            }
        }

        let records = match inventory.get_all_records().await.or_raise(|| ScanErrorKind::Inventory) {
            Ok(records) => records,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let changes = classify(&scanned, &records);
        tracing::info!(files = scanned.len(), records = records.len(), changes = changes.len(), "Scan classified");
        yield Ok(ScanEvent::Classified(changes));
        yield Ok(ScanEvent::Complete);
    })
}

/// Walks every root and keeps the files whose MIME type is allowed, each path
/// at most once (roots may overlap).
async fn discover(ctx: &Context, roots: &[PathBuf], mime_types: &[String]) -> ScanResult<Vec<FileInfo>> {
    let walked = futures::future::try_join_all(roots.iter().map(|root| walk_root(ctx, root))).await?;
    let allowed: HashSet<&str> = mime_types.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    let mut filtered = 0_usize;
    for file in walked.into_iter().flatten() {
        if !file.mime_type.as_deref().is_some_and(|mime| allowed.contains(mime)) {
            filtered += 1;
            continue;
        }
        if seen.insert(file.path.clone()) {
            files.push(file);
        }
    }
    tracing::info!(files = files.len(), filtered, "Discovery complete");
    Ok(files)
}

#[instrument(level = "debug", skip(ctx))]
async fn walk_root(ctx: &Context, root: &Path) -> ScanResult<Vec<FileInfo>> {
    let root = root.to_path_buf();
    let root = tokio::task::spawn_blocking(move || validate_root(root))
        .await
        .or_raise(|| ScanErrorKind::Root)?
        .or_raise(|| ScanErrorKind::Root)?;
    ctx.walker.walk_all(&root).await.or_raise(|| ScanErrorKind::Walk)
}

async fn fingerprint(ctx: &Context, file: FileInfo) -> ScanResult<ScannedFile> {
    let hash = ctx.fingerprinter.fingerprint(Source::Path(&file.path)).await.or_raise(|| ScanErrorKind::Fingerprint)?;
    Ok(file.with_hash(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeOperation;
    use cadence_inventory::{Database, PreferenceRepository, RecordDraft, Repository};
    use async_trait::async_trait;
    use cadence_storage::error::{ErrorKind as StorageErrorKind, Result as StorageResult};
    use cadence_storage::{Fingerprinter, Md5Fingerprinter, fingerprint_bytes};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _db: Database,
        inventory: Repository,
        preferences: PreferenceRepository,
        ctx: Context,
    }

    async fn fixture() -> Fixture {
        let db = Database::connect_in_memory().await.unwrap();
        Fixture {
            inventory: Repository::from(&db),
            preferences: PreferenceRepository::from(&db),
            ctx: Context::default().with_concurrency(2),
            _db: db,
        }
    }

    fn library() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("artist/album")).unwrap();
        fs::write(dir.path().join("artist/album/01.mp3"), b"first track").unwrap();
        fs::write(dir.path().join("artist/album/02.flac"), b"second track").unwrap();
        fs::write(dir.path().join("artist/album/cover.jpg"), b"not music").unwrap();
        fs::write(dir.path().join("notes.txt"), b"not music either").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_no_roots_is_an_empty_scan() {
        let f = fixture().await;
        // Would show up as deleted if the inventory were read.
        f.inventory.save_or_update(RecordDraft::new("/gone.mp3", fingerprint_bytes("gone"), 1)).await.unwrap();

        let events: Vec<_> = scan_events(&f.ctx, &f.inventory, &f.preferences).collect().await;
        assert!(matches!(events[0], Ok(ScanEvent::Started)));
        assert!(matches!(&events[1], Ok(ScanEvent::Classified(changes)) if changes.is_empty()));
        assert!(matches!(events[2], Ok(ScanEvent::Complete)));
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_scan_filters_by_mime_type() {
        let f = fixture().await;
        let dir = library();
        f.preferences.set_library_roots(&[dir.path().to_path_buf()]).await.unwrap();
        f.preferences.set_mime_types(&["audio/mpeg".to_string(), "audio/flac".to_string()]).await.unwrap();

        let changes = scan(&f.ctx, &f.inventory, &f.preferences).await.unwrap();
        let paths: Vec<_> = changes.iter().map(|change| change.path().to_path_buf()).collect();
        assert_eq!(paths, vec![dir.path().join("artist/album/01.mp3"), dir.path().join("artist/album/02.flac")]);
        assert!(changes.iter().all(|change| change.operation() == ChangeOperation::Created));
        assert_eq!(changes[0].file().unwrap().content_hash, fingerprint_bytes("first track"));
    }

    #[tokio::test]
    async fn test_event_order() {
        let f = fixture().await;
        let dir = library();
        f.preferences.set_library_roots(&[dir.path().to_path_buf()]).await.unwrap();
        f.preferences.set_mime_types(&["audio/mpeg".to_string(), "audio/flac".to_string()]).await.unwrap();

        let events: Vec<_> = scan_events(&f.ctx, &f.inventory, &f.preferences)
            .map(|event| event.unwrap())
            .collect()
            .await;
        assert_eq!(events.len(), 7);
        assert!(matches!(events[0], ScanEvent::Started));
        assert!(matches!(events[1], ScanEvent::RootsResolved(1)));
        assert!(matches!(events[2], ScanEvent::DiscoveryComplete(2)));
        assert!(matches!(events[3], ScanEvent::Fingerprinted(_)));
        assert!(matches!(events[4], ScanEvent::Fingerprinted(_)));
        assert!(matches!(&events[5], ScanEvent::Classified(changes) if changes.len() == 2));
        assert!(matches!(events[6], ScanEvent::Complete));
    }

    #[tokio::test]
    async fn test_overlapping_roots_scan_each_file_once() {
        let f = fixture().await;
        let dir = library();
        let roots = vec![dir.path().to_path_buf(), dir.path().join("artist")];
        f.preferences.set_library_roots(&roots).await.unwrap();
        f.preferences.set_mime_types(&["audio/mpeg".to_string()]).await.unwrap();

        let changes = scan(&f.ctx, &f.inventory, &f.preferences).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path(), dir.path().join("artist/album/01.mp3"));
    }

    /// Fingerprints like MD5, except for one file that cannot be read.
    struct Unreadable {
        path: PathBuf,
        inner: Md5Fingerprinter,
    }

    #[async_trait]
    impl Fingerprinter for Unreadable {
        async fn fingerprint(&self, source: Source<'_>) -> StorageResult<String> {
            if let Source::Path(path) = source
                && path == self.path
            {
                exn::bail!(StorageErrorKind::PermissionDenied(path.to_path_buf()));
            }
            self.inner.fingerprint(source).await
        }
    }

    #[tokio::test]
    async fn test_fingerprint_failure_aborts_scan() {
        let mut f = fixture().await;
        let dir = library();
        f.preferences.set_library_roots(&[dir.path().to_path_buf()]).await.unwrap();
        f.preferences.set_mime_types(&["audio/mpeg".to_string(), "audio/flac".to_string()]).await.unwrap();
        let unreadable = Unreadable {
            path: dir.path().join("artist/album/02.flac"),
            inner: Md5Fingerprinter::new(),
        };
        f.ctx = Context::new(f.ctx.walker.clone(), Arc::new(unreadable)).with_concurrency(1);

        let events: Vec<_> = scan_events(&f.ctx, &f.inventory, &f.preferences).collect().await;
        let error = events.last().unwrap().as_ref().unwrap_err();
        assert!(matches!(&**error, LibraryErrorKind::Scan));
        assert!(!events.iter().any(|event| matches!(event, Ok(ScanEvent::Classified(_)))));
        assert!(!events.iter().any(|event| matches!(event, Ok(ScanEvent::Complete))));
        assert!(scan(&f.ctx, &f.inventory, &f.preferences).await.is_err());
    }

    #[tokio::test]
    async fn test_vanished_root_aborts_scan() {
        let f = fixture().await;
        let dir = library();
        let other = library();
        f.preferences.set_library_roots(&[dir.path().to_path_buf(), other.path().to_path_buf()]).await.unwrap();
        f.preferences.set_mime_types(&["audio/mpeg".to_string()]).await.unwrap();
        drop(other);

        let error = scan(&f.ctx, &f.inventory, &f.preferences).await.unwrap_err();
        assert!(matches!(&*error, LibraryErrorKind::Scan));

        let events: Vec<_> = scan_events(&f.ctx, &f.inventory, &f.preferences).collect().await;
        assert!(events.last().unwrap().is_err());
        assert!(!events.iter().any(|event| matches!(event, Ok(ScanEvent::Classified(_)))));
    }
}
