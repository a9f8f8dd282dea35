//! Repository for inventory records.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{InventoryRecord, RecordDraft, RecordId, RecordRow, path_to_string};
use crate::store::InventoryStore;
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use std::path::Path;
use time::UtcDateTime;
use tracing::instrument;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Repository for managing inventory records in the database.
///
/// Content hashes are unique across records (enforced both here and by a
/// unique index); paths are not, so lookups by path return every match,
/// lowest `id` first.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn collect(rows: Vec<RecordRow>) -> Result<Vec<InventoryRecord>> {
        rows.into_iter().map(InventoryRecord::try_from).collect()
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    pub async fn get_by_id(&self, id: RecordId) -> Result<Option<InventoryRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(include_str!("../queries/get_record_by_id.sql"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(InventoryRecord::try_from).transpose()
    }

    pub async fn get_by_path(&self, path: impl AsRef<Path>) -> Result<Vec<InventoryRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(include_str!("../queries/get_records_by_path.sql"))
            .bind(path_to_string(path)?)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::collect(rows)
    }

    pub async fn get_by_content_hash(&self, content_hash: impl AsRef<str>) -> Result<Option<InventoryRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(include_str!("../queries/get_record_by_content_hash.sql"))
            .bind(content_hash.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(InventoryRecord::try_from).transpose()
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_records.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }

    // =========================================================================
    // Insert/Update
    // =========================================================================

    async fn insert(&self, draft: &RecordDraft) -> Result<InventoryRecord> {
        let now = UtcDateTime::now().unix_timestamp();
        let result: sqlx::Result<RecordRow> = sqlx::query_as(include_str!("../queries/insert_record.sql"))
            .bind(path_to_string(&draft.path)?)
            .bind(&draft.content_hash)
            .bind(i64::try_from(draft.size).or_raise(|| ErrorKind::InvalidData("size"))?)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await;
        match result {
            Err(e) if is_unique_violation(&e) => exn::bail!(ErrorKind::Conflict(draft.content_hash.clone())),
            result => result.or_raise(|| ErrorKind::Database)?.try_into(),
        }
    }

    async fn update(&self, id: RecordId, draft: &RecordDraft) -> Result<InventoryRecord> {
        let result: sqlx::Result<Option<RecordRow>> = sqlx::query_as(include_str!("../queries/update_record.sql"))
            .bind(path_to_string(&draft.path)?)
            .bind(&draft.content_hash)
            .bind(i64::try_from(draft.size).or_raise(|| ErrorKind::InvalidData("size"))?)
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await;
        match result {
            Err(e) if is_unique_violation(&e) => exn::bail!(ErrorKind::Conflict(draft.content_hash.clone())),
            result => match result.or_raise(|| ErrorKind::Database)? {
                Some(row) => row.try_into(),
                None => exn::bail!(ErrorKind::RecordNotFound(id)),
            },
        }
    }
}

#[async_trait]
impl InventoryStore for Repository {
    async fn get_all_records(&self) -> Result<Vec<InventoryRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(include_str!("../queries/list_records.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::collect(rows)
    }

    #[instrument(skip(self), fields(path = %draft.path.display()))]
    async fn save_or_update(&self, draft: RecordDraft) -> Result<InventoryRecord> {
        draft.validate()?;
        // Checked up front so that the caller gets a conflict rather than a
        // database error; the unique index still has the final say.
        if let Some(existing) = self.get_by_content_hash(&draft.content_hash).await?
            && Some(existing.id) != draft.id
        {
            exn::bail!(ErrorKind::Conflict(draft.content_hash));
        }
        match draft.id {
            Some(id) => self.update(id, &draft).await,
            None => self.insert(&draft).await,
        }
    }

    async fn delete(&self, record: &InventoryRecord) -> Result<InventoryRecord> {
        let row: Option<RecordRow> = sqlx::query_as(include_str!("../queries/delete_record.sql"))
            .bind(record.id.get())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => row.try_into(),
            None => exn::bail!(ErrorKind::RecordNotFound(record.id)),
        }
    }
}
