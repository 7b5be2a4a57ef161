//! Opaque string-to-string key/value store. Reserved keys
//! (`last_synced_commit`, `last_incremental_sync`, `last_full_rebuild`,
//! `git_conflicts_detected`, `conflict_files`) carry no special handling
//! here; callers are responsible for interpreting their values.

use rusqlite::{params, Connection, OptionalExtension};

use roadmap_common::SyncResult;

use crate::connection::db_err;

pub fn get(conn: &Connection, key: &str) -> SyncResult<Option<String>> {
    conn.query_row("SELECT value FROM sync_state WHERE key = ?1", params![key], |row| row.get(0))
        .optional()
        .map_err(|e| db_err("fetching sync state", e))
}

pub fn set(conn: &Connection, key: &str, value: &str) -> SyncResult<()> {
    conn.execute(
        "INSERT INTO sync_state (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .map_err(|e| db_err("setting sync state", e))?;
    Ok(())
}

pub fn delete(conn: &Connection, key: &str) -> SyncResult<bool> {
    let rows = conn.execute("DELETE FROM sync_state WHERE key = ?1", params![key]).map_err(|e| db_err("deleting sync state", e))?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn get_on_absent_key_is_none() {
        let conn = conn();
        assert!(get(&conn, "last_synced_commit").unwrap().is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let conn = conn();
        set(&conn, "last_synced_commit", "abc123").unwrap();
        assert_eq!(get(&conn, "last_synced_commit").unwrap().unwrap(), "abc123");
    }

    #[test]
    fn set_overwrites_existing_value() {
        let conn = conn();
        set(&conn, "last_synced_commit", "abc123").unwrap();
        set(&conn, "last_synced_commit", "def456").unwrap();
        assert_eq!(get(&conn, "last_synced_commit").unwrap().unwrap(), "def456");
    }
}
