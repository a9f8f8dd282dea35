//! Reconciles a scan against an inventory snapshot.
//!
//! Each scanned file is joined against the inventory on two axes, its path
//! and its content hash:
//!
//! | by path | by hash | outcome                      |
//! |---------|---------|------------------------------|
//! | `A`     | `A`     | [`Unchanged`]                |
//! | `A`     | -       | [`Updated`]                  |
//! | -       | `A`     | [`Moved`]                    |
//! | -       | -       | [`Created`]                  |
//! | `A`     | `B`     | [`Unsupported`] (collision)  |
//!
//! Every record neither join reached is [`Deleted`].
//!
//! [`Unchanged`]: ChangeRecord::Unchanged
//! [`Updated`]: ChangeRecord::Updated
//! [`Moved`]: ChangeRecord::Moved
//! [`Created`]: ChangeRecord::Created
//! [`Unsupported`]: ChangeRecord::Unsupported
//! [`Deleted`]: ChangeRecord::Deleted

use crate::change::{Ambiguity, ChangeRecord};
use cadence_inventory::{InventoryRecord, RecordId};
use cadence_storage::ScannedFile;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::instrument;

/// Both join axes over the inventory, at most one record per key.
struct Index<'a> {
    by_path: HashMap<&'a Path, &'a InventoryRecord>,
    by_hash: HashMap<&'a str, &'a InventoryRecord>,
}
impl<'a> Index<'a> {
    fn build(inventory: &'a [InventoryRecord]) -> Self {
        let mut records: Vec<&InventoryRecord> = inventory.iter().collect();
        // Oldest record wins whenever a key is shared.
        records.sort_by_key(|record| record.id);
        let mut by_path = HashMap::with_capacity(records.len());
        let mut by_hash = HashMap::with_capacity(records.len());
        for record in records {
            match by_path.entry(record.path.as_path()) {
                Entry::Vacant(entry) => {
                    entry.insert(record);
                },
                Entry::Occupied(entry) if entry.get().id != record.id => {
                    tracing::warn!(
                        path = %record.path.display(),
                        kept = %entry.get().id,
                        ignored = %record.id,
                        "Multiple inventory records share a path",
                    );
                },
                Entry::Occupied(_) => {},
            }
            match by_hash.entry(record.content_hash.as_str()) {
                Entry::Vacant(entry) => {
                    entry.insert(record);
                },
                Entry::Occupied(entry) if entry.get().id != record.id => {
                    tracing::warn!(
                        content_hash = %record.content_hash,
                        kept = %entry.get().id,
                        ignored = %record.id,
                        "Multiple inventory records share a content hash",
                    );
                },
                Entry::Occupied(_) => {},
            }
        }
        Self { by_path, by_hash }
    }
}

/// Classify every scanned file against the inventory, then report every
/// inventory record that no scanned file reached as deleted.
///
/// Pure and deterministic: the output is sorted (scanned files by path, then
/// deletions by record id), so permuting either input yields the same vector.
///
/// Anomalies resolve as follows:
/// - several inventory records sharing a path or a hash: the lowest id is used;
/// - the same path scanned twice: only the first (by hash) is classified;
/// - several scanned files sharing a content hash: at most one of them can own
///   that hash in the inventory, so every one of them that would be written is
///   [`Unsupported`](ChangeRecord::Unsupported) instead;
/// - a path that is not valid UTF-8: unsupported, as the inventory cannot
///   hold it, but the record it matches by hash is kept;
/// - a record that a [`Moved`](ChangeRecord::Moved) file found by hash but that
///   is also [`Updated`](ChangeRecord::Updated) in place: the move becomes
///   unsupported.
#[instrument(level = "debug", skip_all, fields(scanned = scanned.len(), inventory = inventory.len()))]
pub fn classify(scanned: &[ScannedFile], inventory: &[InventoryRecord]) -> Vec<ChangeRecord> {
    let index = Index::build(inventory);

    let mut files: Vec<&ScannedFile> = scanned.iter().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.content_hash.cmp(&b.content_hash)));
    files.dedup_by(|next, previous| next.path == previous.path);
    if files.len() != scanned.len() {
        tracing::debug!(collapsed = scanned.len() - files.len(), "Ignored duplicate scanned paths");
    }

    let mut owners: HashMap<&str, usize> = HashMap::with_capacity(files.len());
    for file in files.iter().filter(|file| is_representable(file)) {
        *owners.entry(file.content_hash.as_str()).or_default() += 1;
    }

    let mut matched: HashSet<RecordId> = HashSet::with_capacity(inventory.len());
    let mut changes: Vec<ChangeRecord> = Vec::with_capacity(files.len());
    for file in files {
        let by_path = index.by_path.get(file.path.as_path()).copied();
        let by_hash = index.by_hash.get(file.content_hash.as_str()).copied();
        matched.extend(by_path.iter().chain(by_hash.iter()).map(|record| record.id));
        if !is_representable(file) {
            tracing::warn!(path = %file.path.display(), "Path is not valid UTF-8 and cannot be indexed");
            changes.push(unsupported(file.clone(), Ambiguity::UnrepresentablePath, by_path, by_hash));
            continue;
        }
        let shared = owners.get(file.content_hash.as_str()).is_some_and(|count| *count > 1);
        changes.push(resolve(file, by_path, by_hash, shared));
    }

    let updated_in_place: HashSet<RecordId> = changes
        .iter()
        .filter_map(|change| match change {
            ChangeRecord::Updated { record, .. } => Some(record.id),
            _ => None,
        })
        .collect();
    for change in &mut changes {
        if let ChangeRecord::Moved { file, record } = change
            && updated_in_place.contains(&record.id)
        {
            tracing::warn!(
                path = %file.path.display(),
                record = %record.id,
                "Record content moved away while its original path was rewritten",
            );
            let contested = ChangeRecord::Unsupported {
                file: file.clone(),
                reason: Ambiguity::ContestedRecord,
                by_path: None,
                by_hash: Some(record.clone()),
            };
            *change = contested;
        }
    }

    let mut deleted: Vec<&InventoryRecord> = inventory.iter().filter(|record| !matched.contains(&record.id)).collect();
    deleted.sort_by_key(|record| record.id);
    deleted.dedup_by_key(|record| record.id);
    changes.extend(deleted.into_iter().map(|record| ChangeRecord::Deleted { record: record.clone() }));
    changes
}

/// Inventory paths are UTF-8; anything else could never be written back.
fn is_representable(file: &ScannedFile) -> bool {
    file.path.to_str().is_some()
}

fn resolve(
    file: &ScannedFile,
    by_path: Option<&InventoryRecord>,
    by_hash: Option<&InventoryRecord>,
    shared: bool,
) -> ChangeRecord {
    let file = file.clone();
    match (by_path, by_hash) {
        (Some(path), Some(hash)) if path.id == hash.id => ChangeRecord::Unchanged { file, record: path.clone() },
        (Some(path), Some(hash)) => {
            tracing::warn!(
                path = %file.path.display(),
                at_path = %path.id,
                with_content = %hash.id,
                "Scanned file collides with two inventory records",
            );
            unsupported(file, Ambiguity::IdentityCollision, by_path, by_hash)
        },
        _ if shared => {
            tracing::warn!(
                path = %file.path.display(),
                content_hash = %file.content_hash,
                "Content hash shared by several scanned files",
            );
            unsupported(file, Ambiguity::DuplicateContent, by_path, by_hash)
        },
        (Some(record), None) => ChangeRecord::Updated { file, record: record.clone() },
        (None, Some(record)) => ChangeRecord::Moved { file, record: record.clone() },
        (None, None) => ChangeRecord::Created { file },
    }
}

fn unsupported(
    file: ScannedFile,
    reason: Ambiguity,
    by_path: Option<&InventoryRecord>,
    by_hash: Option<&InventoryRecord>,
) -> ChangeRecord {
    ChangeRecord::Unsupported {
        file,
        reason,
        by_path: by_path.cloned(),
        by_hash: by_hash.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeOperation;
    use cadence_storage::{FileInfo, fingerprint_bytes};
    use rstest::rstest;
    use std::collections::BTreeMap;
    use time::UtcDateTime;

    fn hash(label: &str) -> String {
        fingerprint_bytes(label)
    }

    fn file(path: &str, label: &str) -> ScannedFile {
        FileInfo::new(path, 1024, Some("audio/mpeg".to_string())).with_hash(hash(label))
    }

    fn record(id: i64, path: &str, label: &str) -> InventoryRecord {
        InventoryRecord {
            id: RecordId::new(id),
            path: path.into(),
            content_hash: hash(label),
            size: 1024,
            created_at: UtcDateTime::UNIX_EPOCH,
            updated_at: UtcDateTime::UNIX_EPOCH,
        }
    }

    fn operations(changes: &[ChangeRecord]) -> Vec<(String, ChangeOperation)> {
        changes
            .iter()
            .map(|change| (change.path().display().to_string(), change.operation()))
            .collect()
    }

    #[rstest]
    #[case::unchanged(vec![record(1, "/a/x.mp3", "H1")], vec![file("/a/x.mp3", "H1")], ChangeOperation::None)]
    #[case::updated(vec![record(1, "/a/x.mp3", "H1")], vec![file("/a/x.mp3", "H2")], ChangeOperation::Updated)]
    #[case::moved(vec![record(1, "/a/x.mp3", "H1")], vec![file("/b/y.mp3", "H1")], ChangeOperation::Moved)]
    #[case::created(vec![], vec![file("/a/new.mp3", "H3")], ChangeOperation::Created)]
    #[case::collision(
        vec![record(1, "/a/x.mp3", "H1"), record(2, "/b/y.mp3", "H2")],
        vec![file("/a/x.mp3", "H2")],
        ChangeOperation::Unsupported
    )]
    fn test_classify_single_file(
        #[case] inventory: Vec<InventoryRecord>,
        #[case] scanned: Vec<ScannedFile>,
        #[case] expected: ChangeOperation,
    ) {
        let changes = classify(&scanned, &inventory);
        let file_changes: Vec<_> = changes.iter().filter(|change| change.file().is_some()).collect();
        assert_eq!(file_changes.len(), 1);
        assert_eq!(file_changes[0].operation(), expected);
        assert_eq!(file_changes[0].file(), Some(&scanned[0]));
    }

    #[test]
    fn test_classify_deleted() {
        let inventory = vec![record(1, "/a/x.mp3", "H1")];
        let changes = classify(&[], &inventory);
        assert_eq!(changes, vec![ChangeRecord::Deleted { record: inventory[0].clone() }]);
    }

    #[test]
    fn test_collision_keeps_both_records() {
        let inventory = vec![record(1, "/a/x.mp3", "H1"), record(2, "/b/y.mp3", "H2")];
        let changes = classify(&[file("/a/x.mp3", "H2")], &inventory);
        assert_eq!(changes.len(), 1);
        let ChangeRecord::Unsupported { reason, by_path, by_hash, .. } = &changes[0] else {
            panic!("expected an unsupported change, got {:?}", changes[0]);
        };
        assert_eq!(*reason, Ambiguity::IdentityCollision);
        assert_eq!(by_path.as_ref().map(|r| r.id), Some(RecordId::new(1)));
        assert_eq!(by_hash.as_ref().map(|r| r.id), Some(RecordId::new(2)));
    }

    #[test]
    fn test_updated_and_moved_carry_records() {
        let inventory = vec![record(1, "/a/x.mp3", "H1"), record(2, "/a/y.mp3", "H2")];
        let scanned = vec![file("/a/x.mp3", "H9"), file("/b/y.mp3", "H2")];
        let changes = classify(&scanned, &inventory);
        assert_eq!(changes[0].operation(), ChangeOperation::Updated);
        assert_eq!(changes[0].record().map(|r| r.id), Some(RecordId::new(1)));
        let draft = changes[0].draft().unwrap();
        assert_eq!(draft.id, Some(RecordId::new(1)));
        assert_eq!(draft.content_hash, hash("H9"));
        assert_eq!(draft.path, Path::new("/a/x.mp3"));

        assert_eq!(changes[1].operation(), ChangeOperation::Moved);
        let draft = changes[1].draft().unwrap();
        assert_eq!(draft.id, Some(RecordId::new(2)));
        assert_eq!(draft.path, Path::new("/b/y.mp3"));
        assert_eq!(draft.content_hash, hash("H2"));
    }

    fn mixed() -> (Vec<ScannedFile>, Vec<InventoryRecord>) {
        let inventory = vec![
            record(1, "/lib/same.mp3", "same"),
            record(2, "/lib/edited.mp3", "before"),
            record(3, "/lib/old-name.mp3", "moved"),
            record(4, "/lib/gone.mp3", "gone"),
            record(5, "/lib/clash.mp3", "clash-a"),
            record(6, "/lib/other.mp3", "clash-b"),
        ];
        let scanned = vec![
            file("/lib/same.mp3", "same"),
            file("/lib/edited.mp3", "after"),
            file("/lib/new-name.mp3", "moved"),
            file("/lib/fresh.mp3", "fresh"),
            file("/lib/clash.mp3", "clash-b"),
            file("/lib/other.mp3", "clash-b-original-gone"),
        ];
        (scanned, inventory)
    }

    #[test]
    fn test_completeness() {
        let (scanned, inventory) = mixed();
        let changes = classify(&scanned, &inventory);

        let mut per_path: BTreeMap<String, usize> = BTreeMap::new();
        for change in changes.iter().filter(|change| change.file().is_some()) {
            *per_path.entry(change.path().display().to_string()).or_default() += 1;
        }
        assert_eq!(per_path.len(), scanned.len());
        assert!(per_path.values().all(|count| *count == 1));

        let deleted: Vec<_> = changes
            .iter()
            .filter(|change| change.operation() == ChangeOperation::Deleted)
            .filter_map(|change| change.record().map(|record| record.id))
            .collect();
        assert_eq!(deleted, vec![RecordId::new(4)]);
    }

    #[test]
    fn test_mixed_outcomes() {
        let (scanned, inventory) = mixed();
        let changes = classify(&scanned, &inventory);
        assert_eq!(
            operations(&changes),
            vec![
                ("/lib/clash.mp3".to_string(), ChangeOperation::Unsupported),
                ("/lib/edited.mp3".to_string(), ChangeOperation::Updated),
                ("/lib/fresh.mp3".to_string(), ChangeOperation::Created),
                ("/lib/new-name.mp3".to_string(), ChangeOperation::Moved),
                ("/lib/other.mp3".to_string(), ChangeOperation::Updated),
                ("/lib/same.mp3".to_string(), ChangeOperation::None),
                ("/lib/gone.mp3".to_string(), ChangeOperation::Deleted),
            ],
        );
    }

    #[test]
    fn test_order_independence() {
        let (scanned, inventory) = mixed();
        let expected = classify(&scanned, &inventory);
        for shift in 1..scanned.len() {
            let mut scanned = scanned.clone();
            let mut inventory = inventory.clone();
            scanned.rotate_left(shift);
            let len = inventory.len();
            inventory.rotate_right(shift % len);
            assert_eq!(classify(&scanned, &inventory), expected);
            scanned.reverse();
            inventory.reverse();
            assert_eq!(classify(&scanned, &inventory), expected);
        }
    }

    #[test]
    fn test_idempotence() {
        let (scanned, inventory) = mixed();
        assert_eq!(classify(&scanned, &inventory), classify(&scanned, &inventory));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(classify(&[], &[]).is_empty());
    }

    #[test]
    fn test_duplicate_inventory_path_uses_lowest_id() {
        let inventory = vec![record(7, "/a/x.mp3", "newer"), record(3, "/a/x.mp3", "older")];
        let changes = classify(&[file("/a/x.mp3", "older")], &inventory);
        assert_eq!(
            operations(&changes),
            vec![
                ("/a/x.mp3".to_string(), ChangeOperation::None),
                ("/a/x.mp3".to_string(), ChangeOperation::Deleted),
            ],
        );
        assert_eq!(changes[0].record().map(|r| r.id), Some(RecordId::new(3)));
        assert_eq!(changes[1].record().map(|r| r.id), Some(RecordId::new(7)));
    }

    #[test]
    fn test_duplicate_inventory_path_with_loser_content_is_unsupported() {
        let inventory = vec![record(3, "/a/x.mp3", "older"), record(7, "/a/x.mp3", "newer")];
        let changes = classify(&[file("/a/x.mp3", "newer")], &inventory);
        assert_eq!(operations(&changes), vec![("/a/x.mp3".to_string(), ChangeOperation::Unsupported)]);
    }

    #[test]
    fn test_shared_hash_new_files_are_unsupported() {
        let changes = classify(&[file("/a/one.mp3", "copy"), file("/b/two.mp3", "copy")], &[]);
        assert_eq!(
            operations(&changes),
            vec![
                ("/a/one.mp3".to_string(), ChangeOperation::Unsupported),
                ("/b/two.mp3".to_string(), ChangeOperation::Unsupported),
            ],
        );
        assert!(changes.iter().all(|change| matches!(
            change,
            ChangeRecord::Unsupported { reason: Ambiguity::DuplicateContent, .. }
        )));
    }

    #[test]
    fn test_shared_hash_keeps_unchanged_file() {
        let inventory = vec![record(1, "/a/x.mp3", "H1")];
        let changes = classify(&[file("/a/x.mp3", "H1"), file("/b/copy.mp3", "H1")], &inventory);
        assert_eq!(
            operations(&changes),
            vec![
                ("/a/x.mp3".to_string(), ChangeOperation::None),
                ("/b/copy.mp3".to_string(), ChangeOperation::Unsupported),
            ],
        );
    }

    #[test]
    fn test_shared_hash_records_are_not_deleted() {
        // Both copies of the tracked content moved; neither may claim the record.
        let inventory = vec![record(1, "/a/x.mp3", "H1")];
        let changes = classify(&[file("/b/one.mp3", "H1"), file("/c/two.mp3", "H1")], &inventory);
        assert!(changes.iter().all(|change| change.operation() == ChangeOperation::Unsupported));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_moved_record_rewritten_in_place_is_contested() {
        // Copied to a new path, then the original was re-encoded.
        let inventory = vec![record(1, "/a/x.mp3", "H1")];
        let changes = classify(&[file("/a/x.mp3", "H2"), file("/b/x.mp3", "H1")], &inventory);
        assert_eq!(
            operations(&changes),
            vec![
                ("/a/x.mp3".to_string(), ChangeOperation::Updated),
                ("/b/x.mp3".to_string(), ChangeOperation::Unsupported),
            ],
        );
        assert!(matches!(changes[1], ChangeRecord::Unsupported { reason: Ambiguity::ContestedRecord, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_is_unsupported() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let invalid = Path::new(OsStr::from_bytes(b"/lib/a\xff.mp3"));
        let renamed = FileInfo::new(invalid, 1024, Some("audio/mpeg".to_string())).with_hash(hash("H1"));
        let inventory = vec![record(1, "/lib/old.mp3", "H1")];
        let scanned = vec![renamed, file("/lib/b.mp3", "H2")];

        let changes = classify(&scanned, &inventory);
        assert_eq!(changes.len(), 2);
        let ChangeRecord::Unsupported { reason, by_hash, .. } = &changes[0] else {
            panic!("expected an unsupported change, got {:?}", changes[0]);
        };
        assert_eq!(*reason, Ambiguity::UnrepresentablePath);
        assert_eq!(by_hash.as_ref().map(|r| r.id), Some(RecordId::new(1)));
        assert_eq!(changes[0].draft(), None);
        assert_eq!(changes[1].operation(), ChangeOperation::Created);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_copy_does_not_block_valid_copy() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let invalid = Path::new(OsStr::from_bytes(b"/lib/a\xff.mp3"));
        let copy = FileInfo::new(invalid, 1024, Some("audio/mpeg".to_string())).with_hash(hash("H1"));
        let changes = classify(&[copy, file("/lib/b.mp3", "H1")], &[]);
        assert_eq!(changes[0].operation(), ChangeOperation::Unsupported);
        assert_eq!(changes[1].operation(), ChangeOperation::Created);
    }

    #[test]
    fn test_duplicate_scanned_paths_collapse() {
        let scanned = vec![file("/a/x.mp3", "H1"), file("/a/x.mp3", "H1")];
        let changes = classify(&scanned, &[]);
        assert_eq!(operations(&changes), vec![("/a/x.mp3".to_string(), ChangeOperation::Created)]);
    }
}
