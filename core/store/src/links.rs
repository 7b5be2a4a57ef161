//! Remote link bookkeeping and per-file sync state. Both tables are
//! upserted (`INSERT OR REPLACE`) rather than fail-if-exists: neither
//! carries business invariants beyond the uniqueness the schema already
//! enforces.

use rusqlite::{params, Connection, OptionalExtension};

use roadmap_common::SyncResult;
use roadmap_model::{FileSyncState, RemoteLink};

use crate::connection::db_err;

fn row_to_link(row: &rusqlite::Row) -> rusqlite::Result<RemoteLink> {
    Ok(RemoteLink {
        local_entity_id: row.get("local_entity_id")?,
        backend_name: row.get("backend_name")?,
        remote_id: row.get("remote_id")?,
    })
}

pub fn upsert(conn: &Connection, link: &RemoteLink) -> SyncResult<()> {
    conn.execute(
        "INSERT INTO remote_links (local_entity_id, backend_name, remote_id) VALUES (?1, ?2, ?3)
         ON CONFLICT(local_entity_id, backend_name) DO UPDATE SET remote_id = excluded.remote_id",
        params![link.local_entity_id, link.backend_name, link.remote_id],
    )
    .map_err(|e| db_err("upserting remote link", e))?;
    Ok(())
}

pub fn get(conn: &Connection, local_entity_id: &str, backend_name: &str) -> SyncResult<Option<RemoteLink>> {
    conn.query_row(
        "SELECT * FROM remote_links WHERE local_entity_id = ?1 AND backend_name = ?2",
        params![local_entity_id, backend_name],
        row_to_link,
    )
    .optional()
    .map_err(|e| db_err("fetching remote link", e))
}

pub fn get_by_remote_id(conn: &Connection, backend_name: &str, remote_id: &str) -> SyncResult<Option<RemoteLink>> {
    conn.query_row(
        "SELECT * FROM remote_links WHERE backend_name = ?1 AND remote_id = ?2",
        params![backend_name, remote_id],
        row_to_link,
    )
    .optional()
    .map_err(|e| db_err("fetching remote link by remote id", e))
}

/// No-op if the pair doesn't exist.
pub fn delete(conn: &Connection, local_entity_id: &str, backend_name: &str) -> SyncResult<bool> {
    let rows = conn
        .execute(
            "DELETE FROM remote_links WHERE local_entity_id = ?1 AND backend_name = ?2",
            params![local_entity_id, backend_name],
        )
        .map_err(|e| db_err("deleting remote link", e))?;
    Ok(rows > 0)
}

fn row_to_file_state(row: &rusqlite::Row) -> rusqlite::Result<FileSyncState> {
    let last_modified: String = row.get("last_modified")?;
    Ok(FileSyncState {
        path: row.get("path")?,
        content_hash: row.get("content_hash")?,
        size: row.get::<_, i64>("size")? as u64,
        last_modified: last_modified.parse().unwrap_or_else(|_| chrono::Utc::now()),
    })
}

pub fn get_file_state(conn: &Connection, path: &str) -> SyncResult<Option<FileSyncState>> {
    conn.query_row("SELECT * FROM file_sync_state WHERE path = ?1", params![path], row_to_file_state)
        .optional()
        .map_err(|e| db_err("fetching file sync state", e))
}

pub fn upsert_file_state(conn: &Connection, state: &FileSyncState) -> SyncResult<()> {
    conn.execute(
        "INSERT INTO file_sync_state (path, content_hash, size, last_modified) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(path) DO UPDATE SET content_hash = excluded.content_hash, size = excluded.size, last_modified = excluded.last_modified",
        params![state.path, state.content_hash, state.size as i64, state.last_modified.to_rfc3339()],
    )
    .map_err(|e| db_err("upserting file sync state", e))?;
    Ok(())
}

/// Checks the stored hash for `path` against `current_hash`, treating a
/// missing record as changed.
pub fn has_file_changed(conn: &Connection, path: &str, current_hash: &str) -> SyncResult<bool> {
    let stored = get_file_state(conn, path)?;
    Ok(FileSyncState::has_changed(stored.as_ref(), current_hash))
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
    fn upsert_then_get_round_trips() {
        let conn = conn();
        let link = RemoteLink::new("i-1", "github", "42");
        upsert(&conn, &link).unwrap();
        assert_eq!(get(&conn, "i-1", "github").unwrap().unwrap().remote_id, "42");
    }

    #[test]
    fn upsert_replaces_existing_remote_id() {
        let conn = conn();
        upsert(&conn, &RemoteLink::new("i-1", "github", "42")).unwrap();
        upsert(&conn, &RemoteLink::new("i-1", "github", "43")).unwrap();
        assert_eq!(get(&conn, "i-1", "github").unwrap().unwrap().remote_id, "43");
    }

    #[test]
    fn get_by_remote_id_finds_the_owning_local_entity() {
        let conn = conn();
        upsert(&conn, &RemoteLink::new("i-1", "github", "42")).unwrap();
        let found = get_by_remote_id(&conn, "github", "42").unwrap().unwrap();
        assert_eq!(found.local_entity_id, "i-1");
    }

    #[test]
    fn delete_is_noop_when_absent() {
        let conn = conn();
        assert!(!delete(&conn, "missing", "github").unwrap());
    }

    #[test]
    fn file_state_missing_counts_as_changed() {
        let conn = conn();
        assert!(has_file_changed(&conn, "issues/1.md", "abc").unwrap());
    }

    #[test]
    fn file_state_matching_hash_is_unchanged() {
        let conn = conn();
        let state = FileSyncState::new("issues/1.md", "abc", 10, chrono::Utc::now());
        upsert_file_state(&conn, &state).unwrap();
        assert!(!has_file_changed(&conn, "issues/1.md", "abc").unwrap());
        assert!(has_file_changed(&conn, "issues/1.md", "def").unwrap());
    }
}
