//! Library preferences (roots and MIME allow-list) stored in the inventory
//! database as JSON-encoded string lists.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::path_to_string;
use crate::store::PreferenceStore;
use async_trait::async_trait;
use cadence_storage::{mime, validate_root};
use exn::ResultExt;
use sqlx::{SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tracing::instrument;

const LIBRARY_ROOTS: &str = "library.roots";
const MIME_TYPES: &str = "library.mime_types";

/// Keep the first occurrence of every value.
fn dedup<T: PartialEq + Clone>(values: &[T]) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(value) {
            unique.push(value.clone());
        }
    }
    unique
}

fn roots_from_strings(values: Vec<String>) -> Vec<PathBuf> {
    values.into_iter().map(PathBuf::from).collect()
}

fn roots_to_strings(roots: &[PathBuf]) -> Result<Vec<String>> {
    roots.iter().map(path_to_string).collect()
}

fn validate(root: &Path) -> Result<()> {
    validate_root(root).or_raise(|| ErrorKind::Root)?;
    Ok(())
}

fn normalize_mime(value: &str) -> Result<String> {
    mime::normalize(value).or_raise(|| ErrorKind::InvalidMimeType(value.to_string()))
}

/// SQLite-backed [`PreferenceStore`].
#[derive(Debug, Clone)]
pub struct PreferenceRepository {
    pool: SqlitePool,
}
impl From<&Database> for PreferenceRepository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl PreferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn read(conn: &mut SqliteConnection, key: &str) -> Result<Option<Vec<String>>> {
        let value: Option<String> = sqlx::query_scalar(include_str!("../queries/get_preference.sql"))
            .bind(key)
            .fetch_optional(conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        value
            .map(|json| serde_json::from_str::<Vec<String>>(&json).or_raise(|| ErrorKind::InvalidData("preference")))
            .transpose()
    }

    async fn write(conn: &mut SqliteConnection, key: &str, values: &[String]) -> Result<()> {
        let json = serde_json::to_string(values).or_raise(|| ErrorKind::InvalidData("preference"))?;
        sqlx::query(include_str!("../queries/upsert_preference.sql"))
            .bind(key)
            .bind(json)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<String>>> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::read(&mut *conn, key).await
    }

    /// Read-modify-write a list inside a transaction. Nothing is written when
    /// `modify` fails.
    async fn modify<F>(&self, key: &str, modify: F) -> Result<Vec<String>>
    where
        F: FnOnce(Vec<String>) -> Result<Vec<String>> + Send,
    {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let current = Self::read(&mut *tx, key).await?.unwrap_or_default();
        let updated = modify(current)?;
        Self::write(&mut *tx, key, &updated).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(updated)
    }

    /// Returns `true` if the library roots have ever been written, even if
    /// they were later emptied.
    pub async fn has_library_roots(&self) -> Result<bool> {
        Ok(self.get(LIBRARY_ROOTS).await?.is_some())
    }

    /// Returns `true` if the MIME allow-list has ever been written.
    pub async fn has_mime_types(&self) -> Result<bool> {
        Ok(self.get(MIME_TYPES).await?.is_some())
    }

    /// Initialise preferences that have never been written from configured
    /// defaults. Preferences that already exist (including empty lists) are
    /// left alone.
    ///
    /// Defaults go through the same validation as any other write; a default
    /// that fails validation leaves that preference unset and is reported in
    /// the logs instead of aborting start-up.
    #[instrument(skip_all)]
    pub async fn seed(&self, roots: &[PathBuf], mimes: &[String]) -> Result<()> {
        if !self.has_library_roots().await? {
            match self.set_library_roots(roots).await {
                Ok(roots) => tracing::info!(count = roots.len(), "seeded library roots from configuration"),
                Err(e) if e.is_rejection() => tracing::warn!(error = ?e, "configured library roots rejected"),
                Err(e) => return Err(e),
            }
        }
        if !self.has_mime_types().await? {
            match self.set_mime_types(mimes).await {
                Ok(mimes) => tracing::info!(count = mimes.len(), "seeded MIME types from configuration"),
                Err(e) if e.is_rejection() => tracing::warn!(error = ?e, "configured MIME types rejected"),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for PreferenceRepository {
    async fn library_roots(&self) -> Result<Vec<PathBuf>> {
        Ok(roots_from_strings(self.get(LIBRARY_ROOTS).await?.unwrap_or_default()))
    }

    #[instrument(skip(self))]
    async fn add_library_root(&self, root: &Path) -> Result<Vec<PathBuf>> {
        validate(root)?;
        let root = path_to_string(root)?;
        let roots = self
            .modify(LIBRARY_ROOTS, move |mut roots| {
                if roots.contains(&root) {
                    exn::bail!(ErrorKind::RootAlreadyConfigured(PathBuf::from(root)));
                }
                roots.push(root);
                Ok(roots)
            })
            .await?;
        Ok(roots_from_strings(roots))
    }

    #[instrument(skip(self))]
    async fn remove_library_root(&self, root: &Path) -> Result<Vec<PathBuf>> {
        // No validation: a root that has since been deleted must still be removable.
        let root = path_to_string(root)?;
        let roots = self
            .modify(LIBRARY_ROOTS, move |mut roots| {
                let before = roots.len();
                roots.retain(|r| *r != root);
                if roots.len() == before {
                    exn::bail!(ErrorKind::RootNotConfigured(PathBuf::from(root)));
                }
                Ok(roots)
            })
            .await?;
        Ok(roots_from_strings(roots))
    }

    #[instrument(skip(self))]
    async fn set_library_roots(&self, roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let roots = dedup(roots);
        for root in &roots {
            validate(root)?;
        }
        let strings = roots_to_strings(&roots)?;
        self.modify(LIBRARY_ROOTS, move |_| Ok(strings)).await?;
        Ok(roots)
    }

    async fn mime_types(&self) -> Result<Vec<String>> {
        Ok(self.get(MIME_TYPES).await?.unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn add_mime_type(&self, mime: &str) -> Result<Vec<String>> {
        let mime = normalize_mime(mime)?;
        self.modify(MIME_TYPES, move |mut mimes| {
            if mimes.contains(&mime) {
                exn::bail!(ErrorKind::MimeTypeAlreadyConfigured(mime));
            }
            mimes.push(mime);
            Ok(mimes)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn remove_mime_type(&self, mime: &str) -> Result<Vec<String>> {
        let mime = normalize_mime(mime)?;
        self.modify(MIME_TYPES, move |mut mimes| {
            let before = mimes.len();
            mimes.retain(|m| *m != mime);
            if mimes.len() == before {
                exn::bail!(ErrorKind::MimeTypeNotConfigured(mime));
            }
            Ok(mimes)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn set_mime_types(&self, mimes: &[String]) -> Result<Vec<String>> {
        let normalized = mimes.iter().map(|m| normalize_mime(m)).collect::<Result<Vec<_>>>()?;
        let mimes = dedup(&normalized);
        let written = mimes.clone();
        self.modify(MIME_TYPES, move |_| Ok(written)).await?;
        Ok(mimes)
    }
}
