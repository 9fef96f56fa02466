//! SQLite-backed cache store.
//!
//! Rows live in a `cache_entries` table with a case-insensitive primary key and
//! an index on `expires_at_time` for cleanup sweeps. Timestamps are zone-less
//! UTC text of fixed width, so SQL string comparison orders them correctly.

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::cache::{CacheContext, CacheEntry, CacheStore, MAX_KEY_LENGTH};
use crate::error::Result;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// == SQLite Store ==
/// Thin repository over one SQLite connection.
///
/// Thread-safe via an internal mutex; each context holds it for its lifetime.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and ensures the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        debug!("Opened sqlite cache at {}", path.as_ref().display());
        Self::init(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                id TEXT NOT NULL COLLATE NOCASE PRIMARY KEY CHECK (length(id) <= {}),
                value BLOB NOT NULL,
                absolute_expiration TEXT NULL,
                expires_at_time TEXT NOT NULL,
                sliding_expiration_in_seconds INTEGER NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at_time
                ON cache_entries(expires_at_time);",
            MAX_KEY_LENGTH
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of rows, expired ones included.
    pub fn len(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .lock()
                .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }
}

impl CacheStore for SqliteStore {
    type Timestamp = NaiveDateTime;
    type Context<'a> = SqliteContext<'a>;

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn create_context(&self) -> Result<SqliteContext<'_>> {
        let conn = self.conn.lock();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(SqliteContext {
            conn,
            finished: false,
        })
    }
}

// == SQLite Context ==
/// One `BEGIN IMMEDIATE` transaction; rolled back on drop unless committed.
pub struct SqliteContext<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl CacheContext for SqliteContext<'_> {
    type Timestamp = NaiveDateTime;

    fn find(&mut self, id: &str) -> Result<Option<CacheEntry<NaiveDateTime>>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, value, absolute_expiration, expires_at_time, sliding_expiration_in_seconds
             FROM cache_entries WHERE id = ?1",
        )?;
        let entry = stmt.query_row(params![id], row_to_entry).optional()?;
        Ok(entry)
    }

    fn add(&mut self, entry: &CacheEntry<NaiveDateTime>) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO cache_entries
                (id, value, absolute_expiration, expires_at_time, sliding_expiration_in_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        Ok(stmt.execute(params![
            entry.id,
            entry.value,
            entry.absolute_expiration.map(format_timestamp),
            format_timestamp(entry.expires_at_time),
            entry.sliding_expiration_in_seconds,
        ])?)
    }

    fn update(&mut self, entry: &CacheEntry<NaiveDateTime>) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(
            "UPDATE cache_entries
             SET value = ?2, absolute_expiration = ?3, expires_at_time = ?4,
                 sliding_expiration_in_seconds = ?5
             WHERE id = ?1",
        )?;
        Ok(stmt.execute(params![
            entry.id,
            entry.value,
            entry.absolute_expiration.map(format_timestamp),
            format_timestamp(entry.expires_at_time),
            entry.sliding_expiration_in_seconds,
        ])?)
    }

    fn remove(&mut self, id: &str) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM cache_entries WHERE id = ?1")?;
        Ok(stmt.execute(params![id])?)
    }

    fn remove_expired(&mut self, now: NaiveDateTime) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM cache_entries WHERE expires_at_time < ?1")?;
        Ok(stmt.execute(params![format_timestamp(now)])?)
    }

    fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteContext<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                debug!("Rollback failed: {}", err);
            }
        }
    }
}

// == Row Mapping ==
fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CacheEntry<NaiveDateTime>> {
    let absolute_expiration = row
        .get::<_, Option<String>>(2)?
        .map(|text| parse_timestamp(2, &text))
        .transpose()?;

    Ok(CacheEntry {
        id: row.get(0)?,
        value: row.get(1)?,
        absolute_expiration,
        expires_at_time: parse_timestamp(3, &row.get::<_, String>(3)?)?,
        sliding_expiration_in_seconds: row.get(4)?,
    })
}

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(column: usize, text: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn entry(id: &str, expires_in: i64) -> CacheEntry<NaiveDateTime> {
        CacheEntry {
            id: id.to_string(),
            value: vec![1, 2, 3],
            absolute_expiration: Some(now() + TimeDelta::hours(1)),
            expires_at_time: now() + TimeDelta::seconds(expires_in),
            sliding_expiration_in_seconds: Some(60),
        }
    }

    #[test]
    fn test_timestamp_text_is_fixed_width() {
        let whole = format_timestamp(now());
        let fraction = format_timestamp(now() + TimeDelta::milliseconds(5));

        assert_eq!(whole, "2000-01-01 00:00:00.000000");
        assert_eq!(fraction, "2000-01-01 00:00:00.005000");
        assert!(whole < fraction);
        assert_eq!(parse_timestamp(0, &fraction).unwrap(), now() + TimeDelta::milliseconds(5));
    }

    #[test]
    fn test_add_and_find_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ctx = store.create_context().unwrap();
        ctx.add(&entry("key", 10)).unwrap();
        ctx.commit().unwrap();

        let mut ctx = store.create_context().unwrap();
        assert_eq!(ctx.find("key").unwrap(), Some(entry("key", 10)));
    }

    #[test]
    fn test_find_ignores_case() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ctx = store.create_context().unwrap();
        ctx.add(&entry("Test-Id", 10)).unwrap();

        let found = ctx.find("TEST-ID").unwrap().unwrap();
        assert_eq!(found.id, "Test-Id");
    }

    #[test]
    fn test_duplicate_key_is_a_storage_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ctx = store.create_context().unwrap();
        ctx.add(&entry("key", 10)).unwrap();

        let err = ctx.add(&entry("KEY", 10)).unwrap_err();
        assert!(matches!(err, crate::error::CacheError::Storage(_)));
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        {
            let mut ctx = store.create_context().unwrap();
            ctx.add(&entry("key", 10)).unwrap();
        }

        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_update_rewrites_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ctx = store.create_context().unwrap();
        ctx.add(&entry("key", 10)).unwrap();

        let mut changed = entry("key", 30);
        changed.value = vec![9];
        changed.absolute_expiration = None;
        changed.sliding_expiration_in_seconds = None;
        assert_eq!(ctx.update(&changed).unwrap(), 1);
        assert_eq!(ctx.find("key").unwrap(), Some(changed));
        assert_eq!(ctx.update(&entry("missing", 1)).unwrap(), 0);
    }

    #[test]
    fn test_remove_expired_is_strict() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ctx = store.create_context().unwrap();
        ctx.add(&entry("past", -1)).unwrap();
        ctx.add(&entry("now", 0)).unwrap();
        ctx.add(&entry("future", 1)).unwrap();

        assert_eq!(ctx.remove_expired(now()).unwrap(), 1);
        assert_eq!(ctx.remove("now").unwrap(), 1);
        assert_eq!(ctx.remove("now").unwrap(), 0);
        ctx.commit().unwrap();

        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            let mut ctx = store.create_context().unwrap();
            ctx.add(&entry("key", 10)).unwrap();
            ctx.commit().unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
    }
}
