//! Connection discipline: one `rusqlite::Connection` per worker, with a
//! context-managed transaction that commits on normal exit and rolls
//! back on any failure. Foreign keys are enforced at session start.

use std::path::Path;

use rusqlite::Connection;

use roadmap_common::{SyncError, SyncErrorType, SyncResult};

use crate::schema;

pub(crate) fn db_err(context: &str, err: rusqlite::Error) -> SyncError {
    SyncError::new(SyncErrorType::DatabaseError, format!("{context}: {err}"))
}

/// One connection, one worker. `Store` is the facade every entity
/// repository is invoked through; it never hands out the raw
/// connection so every mutation goes through `transaction`.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if absent) the store file at `path` and runs
    /// migrations. WAL journaling is requested where the backing
    /// filesystem supports it; schema creation is idempotent.
    pub fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let conn = Connection::open(path).map_err(|e| db_err("opening store", e))?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// An ephemeral store for tests and dry runs.
    pub fn in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| db_err("opening in-memory store", e))?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Runs `body` inside a serializable transaction on this worker's
    /// connection: commits on `Ok`, rolls back on `Err`. No operation
    /// may suspend inside the transaction except the single write that
    /// ends it (§5).
    pub fn transaction<T>(&mut self, body: impl FnOnce(&rusqlite::Transaction) -> SyncResult<T>) -> SyncResult<T> {
        let txn = self.conn.transaction().map_err(|e| db_err("beginning transaction", e))?;
        let result = body(&txn);
        match result {
            Ok(value) => {
                txn.commit().map_err(|e| db_err("committing transaction", e))?;
                Ok(value)
            }
            Err(err) => {
                // A rollback failure is logged-and-swallowed upstream by the
                // caller's error; the transaction is dropped either way and
                // SQLite rolls back on drop if not committed.
                let _ = txn.rollback();
                Err(err)
            }
        }
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Reclaims disk space and defragments the database file.
    pub fn vacuum(&self) -> SyncResult<()> {
        self.conn.execute_batch("VACUUM").map_err(|e| db_err("vacuum", e))
    }

    /// Releases this worker's connection. `Store` is also dropped
    /// normally; this exists so callers have an explicit, named
    /// lifecycle hook matching the teacher facade's `close`.
    pub fn close(self) -> SyncResult<()> {
        self.conn.close().map_err(|(_, e)| db_err("closing store", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_commits_on_ok() {
        let mut store = Store::in_memory().unwrap();
        store
            .transaction(|txn| {
                txn.execute("INSERT INTO sync_state (key, value) VALUES ('k', 'v')", [])
                    .map_err(|e| db_err("insert", e))?;
                Ok(())
            })
            .unwrap();

        let value: String = store
            .conn()
            .query_row("SELECT value FROM sync_state WHERE key = 'k'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, "v");
    }

    #[test]
    fn transaction_rolls_back_on_err() {
        let mut store = Store::in_memory().unwrap();
        let result: SyncResult<()> = store.transaction(|txn| {
            txn.execute("INSERT INTO sync_state (key, value) VALUES ('k', 'v')", [])
                .map_err(|e| db_err("insert", e))?;
            Err(SyncError::new(SyncErrorType::ValidationError, "force rollback"))
        });
        assert!(result.is_err());

        let count: i64 = store.conn().query_row("SELECT COUNT(*) FROM sync_state", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn vacuum_does_not_error_on_empty_store() {
        let store = Store::in_memory().unwrap();
        store.vacuum().unwrap();
    }
}
