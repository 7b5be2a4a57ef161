//! Project repository: fail-if-exists create, no-op-if-missing update,
//! cascading delete.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use roadmap_model::{Project, ProjectStatus};

use crate::connection::db_err;

fn status_str(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::Active => "active",
        ProjectStatus::Archived => "archived",
    }
}

fn parse_status(s: &str) -> ProjectStatus {
    match s {
        "archived" => ProjectStatus::Archived,
        _ => ProjectStatus::Active,
    }
}

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    let remote_ids_json: String = row.get("remote_ids")?;
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        status: parse_status(&row.get::<_, String>("status")?),
        remote_ids: serde_json::from_str(&remote_ids_json).unwrap_or_default(),
    })
}

/// Inserts a new project. Fails with `duplicate_entity` if `project.id`
/// already exists.
pub fn create(conn: &Connection, project: &Project) -> SyncResult<()> {
    let exists: bool = conn
        .query_row("SELECT 1 FROM projects WHERE id = ?1", params![project.id], |_| Ok(true))
        .optional()
        .map_err(|e| db_err("checking project existence", e))?
        .unwrap_or(false);

    if exists {
        return Err(SyncError::new(SyncErrorType::DuplicateEntity, format!("project {} already exists", project.id))
            .with_entity("project", project.id.clone()));
    }

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO projects (id, name, description, status, remote_ids, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            project.id,
            project.name,
            project.description,
            status_str(project.status),
            serde_json::to_string(&project.remote_ids).unwrap_or_default(),
            now,
        ],
    )
    .map_err(|e| db_err("creating project", e))?;
    Ok(())
}

/// Updates an existing project in place. Returns `false` (no-op) if no
/// row with `project.id` exists.
pub fn update(conn: &Connection, project: &Project) -> SyncResult<bool> {
    let rows = conn
        .execute(
            "UPDATE projects SET name = ?2, description = ?3, status = ?4, remote_ids = ?5 WHERE id = ?1",
            params![
                project.id,
                project.name,
                project.description,
                status_str(project.status),
                serde_json::to_string(&project.remote_ids).unwrap_or_default(),
            ],
        )
        .map_err(|e| db_err("updating project", e))?;
    Ok(rows > 0)
}

pub fn get(conn: &Connection, id: &str) -> SyncResult<Option<Project>> {
    conn.query_row("SELECT * FROM projects WHERE id = ?1", params![id], row_to_project)
        .optional()
        .map_err(|e| db_err("fetching project", e))
}

pub fn list(conn: &Connection) -> SyncResult<Vec<Project>> {
    let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY id").map_err(|e| db_err("listing projects", e))?;
    let rows = stmt
        .query_map([], row_to_project)
        .map_err(|e| db_err("listing projects", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| db_err("listing projects", e))?;
    Ok(rows)
}

/// Cascades to milestones and issues via `ON DELETE CASCADE`/`SET NULL`.
pub fn delete(conn: &Connection, id: &str) -> SyncResult<bool> {
    let rows = conn.execute("DELETE FROM projects WHERE id = ?1", params![id]).map_err(|e| db_err("deleting project", e))?;
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
    fn create_then_get_round_trips() {
        let conn = conn();
        let project = Project::new("p-1", "Roadmap").unwrap();
        create(&conn, &project).unwrap();
        let fetched = get(&conn, "p-1").unwrap().unwrap();
        assert_eq!(fetched.name, "Roadmap");
    }

    #[test]
    fn create_is_fail_if_exists() {
        let conn = conn();
        let project = Project::new("p-1", "Roadmap").unwrap();
        create(&conn, &project).unwrap();
        let err = create(&conn, &project).unwrap_err();
        assert_eq!(err.category, SyncErrorType::DuplicateEntity);
    }

    #[test]
    fn update_is_noop_if_missing() {
        let conn = conn();
        let project = Project::new("p-1", "Roadmap").unwrap();
        assert!(!update(&conn, &project).unwrap());
    }

    #[test]
    fn update_changes_existing_row() {
        let conn = conn();
        let mut project = Project::new("p-1", "Roadmap").unwrap();
        create(&conn, &project).unwrap();
        project.description = "updated".to_string();
        assert!(update(&conn, &project).unwrap());
        assert_eq!(get(&conn, "p-1").unwrap().unwrap().description, "updated");
    }

    #[test]
    fn delete_returns_false_when_absent() {
        let conn = conn();
        assert!(!delete(&conn, "missing").unwrap());
    }
}
