//! Milestone repository: name uniqueness among open milestones is
//! enforced by the schema's partial unique index, not here.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use roadmap_model::{Milestone, MilestoneStatus};

use crate::connection::db_err;

fn status_str(status: MilestoneStatus) -> &'static str {
    match status {
        MilestoneStatus::Open => "open",
        MilestoneStatus::Closed => "closed",
    }
}

fn parse_status(s: &str) -> MilestoneStatus {
    match s {
        "closed" => MilestoneStatus::Closed,
        _ => MilestoneStatus::Open,
    }
}

fn row_to_milestone(row: &rusqlite::Row) -> rusqlite::Result<Milestone> {
    let remote_ids_json: String = row.get("remote_ids")?;
    let due_date: Option<String> = row.get("due_date")?;
    Ok(Milestone {
        id: row.get("id")?,
        name: row.get("name")?,
        headline: row.get("headline")?,
        due_date: due_date.and_then(|d| chrono::DateTime::parse_from_rfc3339(&d).ok()).map(|d| d.with_timezone(&Utc)),
        status: parse_status(&row.get::<_, String>("status")?),
        project: row.get("project_id")?,
        remote_ids: serde_json::from_str(&remote_ids_json).unwrap_or_default(),
    })
}

fn unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Inserts a new milestone. Fails with `duplicate_entity` if `milestone.id`
/// already exists, or if its `name` collides with another open milestone.
pub fn create(conn: &Connection, milestone: &Milestone) -> SyncResult<()> {
    let exists: bool = conn
        .query_row("SELECT 1 FROM milestones WHERE id = ?1", params![milestone.id], |_| Ok(true))
        .optional()
        .map_err(|e| db_err("checking milestone existence", e))?
        .unwrap_or(false);
    if exists {
        return Err(SyncError::new(SyncErrorType::DuplicateEntity, format!("milestone {} already exists", milestone.id))
            .with_entity("milestone", milestone.id.clone()));
    }

    let now = Utc::now().to_rfc3339();
    let result = conn.execute(
        "INSERT INTO milestones (id, project_id, name, headline, due_date, status, remote_ids, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            milestone.id,
            milestone.project,
            milestone.name,
            milestone.headline,
            milestone.due_date.map(|d| d.to_rfc3339()),
            status_str(milestone.status),
            serde_json::to_string(&milestone.remote_ids).unwrap_or_default(),
            now,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if unique_violation(&e) => Err(SyncError::new(
            SyncErrorType::DuplicateEntity,
            format!("an open milestone named '{}' already exists", milestone.name),
        )
        .with_entity("milestone", milestone.id.clone())),
        Err(e) => Err(db_err("creating milestone", e)),
    }
}

/// Updates an existing milestone. Returns `false` if no row with
/// `milestone.id` exists.
pub fn update(conn: &Connection, milestone: &Milestone) -> SyncResult<bool> {
    let result = conn.execute(
        "UPDATE milestones SET project_id = ?2, name = ?3, headline = ?4, due_date = ?5, status = ?6, remote_ids = ?7
         WHERE id = ?1",
        params![
            milestone.id,
            milestone.project,
            milestone.name,
            milestone.headline,
            milestone.due_date.map(|d| d.to_rfc3339()),
            status_str(milestone.status),
            serde_json::to_string(&milestone.remote_ids).unwrap_or_default(),
        ],
    );

    match result {
        Ok(rows) => Ok(rows > 0),
        Err(e) if unique_violation(&e) => Err(SyncError::new(
            SyncErrorType::DuplicateEntity,
            format!("an open milestone named '{}' already exists", milestone.name),
        )),
        Err(e) => Err(db_err("updating milestone", e)),
    }
}

pub fn get(conn: &Connection, id: &str) -> SyncResult<Option<Milestone>> {
    conn.query_row("SELECT * FROM milestones WHERE id = ?1", params![id], row_to_milestone)
        .optional()
        .map_err(|e| db_err("fetching milestone", e))
}

pub fn get_by_name(conn: &Connection, name: &str) -> SyncResult<Option<Milestone>> {
    conn.query_row(
        "SELECT * FROM milestones WHERE name = ?1 AND status = 'open'",
        params![name],
        row_to_milestone,
    )
    .optional()
    .map_err(|e| db_err("fetching milestone by name", e))
}

pub fn list(conn: &Connection) -> SyncResult<Vec<Milestone>> {
    let mut stmt = conn.prepare("SELECT * FROM milestones ORDER BY id").map_err(|e| db_err("listing milestones", e))?;
    let rows = stmt
        .query_map([], row_to_milestone)
        .map_err(|e| db_err("listing milestones", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| db_err("listing milestones", e))?;
    Ok(rows)
}

/// Cascades to child issues' `milestone_id` via `ON DELETE SET NULL`.
pub fn delete(conn: &Connection, id: &str) -> SyncResult<bool> {
    let rows = conn.execute("DELETE FROM milestones WHERE id = ?1", params![id]).map_err(|e| db_err("deleting milestone", e))?;
    Ok(rows > 0)
}
