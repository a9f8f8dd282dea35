//! The inventory database file.
//!
//! Access is lopsided: a scan reads the preferences and one snapshot of every
//! record, and `apply` then writes a change set from a single task. WAL lets
//! those reads proceed while a write is in flight, and a small pool is enough
//! for one writer plus the odd concurrent reader.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

const FILE_CONNECTIONS: u32 = 2;
/// How long a reader waits on the writer's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the inventory lives.
enum Location<'a> {
    File(&'a Path),
    /// Private to its single connection; gone once the pool closes.
    Memory,
}
impl Location<'_> {
    fn options(&self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new().busy_timeout(BUSY_TIMEOUT);
        match self {
            // A lost tail of a change set is recovered by the next scan, so
            // NORMAL durability is enough.
            Self::File(path) => options
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
            Self::Memory => options.filename(":memory:").journal_mode(SqliteJournalMode::Memory),
        }
    }

    fn max_connections(&self) -> u32 {
        match self {
            Self::File(_) => FILE_CONNECTIONS,
            // Every connection to ":memory:" is a different database.
            Self::Memory => 1,
        }
    }
}

/// Connection pool over the inventory; [`Repository`](crate::Repository) and
/// [`PreferenceRepository`](crate::PreferenceRepository) are built from it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the inventory at `path` and bring its schema up to date.
    ///
    /// Parent directories are not created.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Location::File(path.as_ref())).await
    }

    /// A throwaway inventory. Not gated behind `cfg(test)` so that other
    /// crates can use it in their own tests.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(Location::Memory).await
    }

    #[instrument(level = "debug", skip_all)]
    async fn open(location: Location<'_>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(location.max_connections())
            .connect_with(location.options())
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::migrate!("./migrations").run(&pool).await.or_raise(|| ErrorKind::Migration)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for outstanding queries and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
