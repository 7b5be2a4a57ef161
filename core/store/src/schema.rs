//! DDL for the embedded store. Migrations are a flat, ordered list of
//! `PRAGMA`/`CREATE`/`ALTER` statements applied idempotently on open —
//! no separate migration table is needed since every statement is
//! `IF NOT EXISTS` or tolerant of re-application.

use rusqlite::Connection;

use roadmap_common::{SyncError, SyncErrorType, SyncResult};

fn db_err(context: &str, err: rusqlite::Error) -> SyncError {
    SyncError::new(SyncErrorType::DatabaseError, format!("{context}: {err}"))
}

const MIGRATIONS: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    "PRAGMA journal_mode = WAL",
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'active',
        remote_ids TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS milestones (
        id TEXT PRIMARY KEY,
        project_id TEXT REFERENCES projects(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        headline TEXT NOT NULL DEFAULT '',
        due_date TEXT,
        status TEXT NOT NULL DEFAULT 'open',
        remote_ids TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    // Name uniqueness is enforced among non-closed (i.e. non-archived-equivalent)
    // milestones only, per §3; a partial unique index models that directly.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_milestones_name_open
    ON milestones(name) WHERE status = 'open'
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS issues (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'backlog',
        priority TEXT,
        assignee TEXT,
        milestone_id TEXT REFERENCES milestones(id) ON DELETE SET NULL,
        project_id TEXT REFERENCES projects(id) ON DELETE SET NULL,
        remote_ids TEXT NOT NULL DEFAULT '{}',
        sync_metadata TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS issue_labels (
        issue_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
        label TEXT NOT NULL,
        PRIMARY KEY (issue_id, label)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS issue_dependencies (
        issue_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
        depends_on_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (issue_id, depends_on_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        issue_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
        author TEXT,
        body TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
    "#,
    // (local_entity_id, backend_name) unique via primary key; (backend_name,
    // remote_id) unique via the secondary index — both invariants from §3.
    r#"
    CREATE TABLE IF NOT EXISTS remote_links (
        local_entity_id TEXT NOT NULL,
        backend_name TEXT NOT NULL,
        remote_id TEXT NOT NULL,
        PRIMARY KEY (local_entity_id, backend_name)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_remote_links_backend_remote
    ON remote_links(backend_name, remote_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS file_sync_state (
        path TEXT PRIMARY KEY,
        content_hash TEXT NOT NULL,
        size INTEGER NOT NULL,
        last_modified TEXT NOT NULL
    )
    "#,
    // `updated_at` trigger: refreshed on every row update, per §4.3's
    // contract. Guarded with `WHEN NEW.updated_at = OLD.updated_at` so a
    // caller that already bumped the timestamp isn't overridden, and so
    // the trigger doesn't recurse.
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_issues_updated_at
    AFTER UPDATE ON issues
    WHEN NEW.updated_at = OLD.updated_at
    BEGIN
        UPDATE issues SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_milestones_updated_at
    AFTER UPDATE ON milestones
    WHEN NEW.updated_at = OLD.updated_at
    BEGIN
        UPDATE milestones SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_projects_updated_at
    AFTER UPDATE ON projects
    WHEN NEW.updated_at = OLD.updated_at
    BEGIN
        UPDATE projects SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
    END
    "#,
];

/// Applies every migration in order. Idempotent: safe to call on every
/// open, including against an already-migrated database.
pub fn migrate(conn: &Connection) -> SyncResult<()> {
    for statement in MIGRATIONS {
        conn.execute_batch(statement).map_err(|e| db_err("schema migration", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
    }

    #[test]
    fn foreign_keys_are_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let enabled: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
        assert_eq!(enabled, 1);
    }
}
