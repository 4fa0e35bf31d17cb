// # SQLite Sponsor Store
//
// Relational implementation of SponsorStore.
//
// ## Purpose
//
// Persists sponsors and run metadata across restarts. The read-side
// endpoint serves straight from these tables.
//
// ## Merge Strategy
//
// Upserts are a read-modify-write inside one IMMEDIATE transaction, so the
// sticky-field policy is applied by the same `merge_sponsor` function the
// memory store uses rather than by a backend-specific conflict clause.
//
// ## Schema
//
// ```sql
// sponsors(user_id PK, name, avatar, all_sum_amount, create_time,
//          first_pay_time, last_pay_time, updated_at)
// sync_metadata(id PK, key UNIQUE, value, updated_at)
// ```

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::Error;
use crate::traits::sponsor_store::{
    MergePolicy, RunMetadata, SponsorRecord, SponsorStore, SponsorUpsert, merge_sponsor,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sponsors (
    user_id        TEXT PRIMARY KEY NOT NULL,
    name           TEXT NOT NULL DEFAULT '',
    avatar         TEXT,
    all_sum_amount TEXT NOT NULL DEFAULT '0.00',
    create_time    INTEGER NOT NULL,
    first_pay_time INTEGER,
    last_pay_time  INTEGER,
    updated_at     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sponsors_create_time ON sponsors(create_time);
CREATE INDEX IF NOT EXISTS idx_sponsors_last_pay_time ON sponsors(last_pay_time);
CREATE TABLE IF NOT EXISTS sync_metadata (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    key        TEXT NOT NULL UNIQUE,
    value      TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

/// SQLite-backed sponsor store
///
/// Synchronous rusqlite calls run on the blocking pool via
/// `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct SqliteSponsorStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSponsorStore {
    /// Open (or create) the database at `path`
    ///
    /// Creates parent directories and missing tables.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::config(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("SQLite journal mode: {}", mode);
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("SQLite schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::store(format!("{op}: connection lock poisoned")))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::store(format!("{op}: {e}")))?
    }
}

fn read_sponsor(conn: &Connection, user_id: &str) -> Result<Option<SponsorRecord>, Error> {
    let record = conn
        .query_row(
            "SELECT user_id, name, avatar, all_sum_amount, create_time,
                    first_pay_time, last_pay_time, updated_at
             FROM sponsors WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(SponsorRecord {
                    user_id: row.get(0)?,
                    name: row.get(1)?,
                    avatar: row.get(2)?,
                    all_sum_amount: row.get(3)?,
                    create_time: row.get(4)?,
                    first_pay_time: row.get(5)?,
                    last_pay_time: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

#[async_trait]
impl SponsorStore for SqliteSponsorStore {
    async fn upsert_sponsor(&self, upsert: &SponsorUpsert, policy: MergePolicy) -> Result<(), Error> {
        let upsert = upsert.clone();
        self.with_conn("upsert_sponsor", move |conn| {
            let now = chrono::Utc::now().timestamp();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let existing = read_sponsor(&tx, &upsert.user_id)?;
            let merged = merge_sponsor(existing.as_ref(), &upsert, policy, now);

            tx.execute(
                "INSERT INTO sponsors (user_id, name, avatar, all_sum_amount, create_time,
                                       first_pay_time, last_pay_time, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(user_id) DO UPDATE SET
                     name = excluded.name,
                     avatar = excluded.avatar,
                     all_sum_amount = excluded.all_sum_amount,
                     create_time = excluded.create_time,
                     first_pay_time = excluded.first_pay_time,
                     last_pay_time = excluded.last_pay_time,
                     updated_at = excluded.updated_at",
                params![
                    merged.user_id,
                    merged.name,
                    merged.avatar,
                    merged.all_sum_amount,
                    merged.create_time,
                    merged.first_pay_time,
                    merged.last_pay_time,
                    merged.updated_at,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_sponsor(&self, user_id: &str) -> Result<Option<SponsorRecord>, Error> {
        let user_id = user_id.to_string();
        self.with_conn("get_sponsor", move |conn| read_sponsor(conn, &user_id))
            .await
    }

    async fn sponsor_count(&self) -> Result<usize, Error> {
        self.with_conn("sponsor_count", |conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM sponsors", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn upsert_run_metadata(&self, key: &str, value: &str, timestamp: i64) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        self.with_conn("upsert_run_metadata", move |conn| {
            conn.execute(
                "INSERT INTO sync_metadata (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, timestamp],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_run_metadata(&self, key: &str) -> Result<Option<RunMetadata>, Error> {
        let key = key.to_string();
        self.with_conn("get_run_metadata", move |conn| {
            let meta = conn
                .query_row(
                    "SELECT key, value, updated_at FROM sync_metadata WHERE key = ?1",
                    params![key],
                    |row| {
                        Ok(RunMetadata {
                            key: row.get(0)?,
                            value: row.get(1)?,
                            updated_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(meta)
        })
        .await
    }
}
