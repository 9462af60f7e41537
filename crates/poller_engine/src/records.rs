//! `SQLite` record store for saved tweets.

use std::path::Path;

use poller_core::{RecordSink, StorageError, StoredRecord};
use poller_logging::poller_info;
use rusqlite::{params, Connection};

const SCHEMA_VERSION: i32 = 1;

/// Append-only `tweets` table. Rows are never updated; ids may repeat.
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Open or create the database at the given path.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path.as_ref()).map_err(|err| {
            StorageError::Unavailable(format!(
                "failed to open database at {}: {err}",
                db_path.as_ref().display()
            ))
        })?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )
        .map_err(unavailable)?;

        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        let current_version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(unavailable)?;

        if current_version < SCHEMA_VERSION {
            poller_info!(
                "Migrating tweet database from version {} to {}",
                current_version,
                SCHEMA_VERSION
            );
            self.conn
                .execute_batch(&format!(
                    "
                    CREATE TABLE IF NOT EXISTS tweets (
                        tweet_id TEXT NOT NULL,
                        created_at TEXT NOT NULL,
                        created_timestamp INTEGER NOT NULL,
                        payload TEXT NOT NULL,
                        counter INTEGER NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_tweets_counter ON tweets(counter);
                    PRAGMA user_version = {SCHEMA_VERSION};
                    "
                ))
                .map_err(unavailable)?;
        }
        Ok(())
    }

    /// All rows in counter order.
    pub fn records(&self) -> Result<Vec<StoredRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT tweet_id, created_at, created_timestamp, payload, counter
                 FROM tweets ORDER BY counter, rowid",
            )
            .map_err(query)?;
        let rows = stmt
            .query_map([], |row| {
                let counter: i64 = row.get(4)?;
                let counter = u64::try_from(counter)
                    .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(4, counter))?;
                Ok(StoredRecord {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    created_timestamp: row.get(2)?,
                    payload_json: row.get(3)?,
                    counter,
                })
            })
            .map_err(query)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query)
    }
}

impl RecordSink for SqliteRecordStore {
    fn insert(&mut self, record: &StoredRecord) -> Result<(), StorageError> {
        let counter = i64::try_from(record.counter)
            .map_err(|_| StorageError::Query(format!("counter {} overflows", record.counter)))?;
        self.conn
            .execute(
                "INSERT INTO tweets (tweet_id, created_at, created_timestamp, payload, counter)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.created_at,
                    record.created_timestamp,
                    record.payload_json,
                    counter
                ],
            )
            .map_err(query)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<usize, StorageError> {
        self.conn.execute("DELETE FROM tweets", []).map_err(query)
    }

    fn count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tweets", [], |row| row.get(0))
            .map_err(query)?;
        usize::try_from(count)
            .map_err(|_| StorageError::Query(format!("row count {count} out of range")))
    }
}

fn unavailable(err: rusqlite::Error) -> StorageError {
    StorageError::Unavailable(err.to_string())
}

fn query(err: rusqlite::Error) -> StorageError {
    StorageError::Query(err.to_string())
}
