//! Issue repository. Labels and dependencies live in join tables and are
//! synchronized (delete-then-reinsert) on every write so the issue row
//! and its children never diverge.

use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use roadmap_model::{Issue, IssueStatus, Priority};

use crate::connection::db_err;

fn status_str(status: IssueStatus) -> &'static str {
    match status {
        IssueStatus::Backlog => "backlog",
        IssueStatus::Todo => "todo",
        IssueStatus::InProgress => "in-progress",
        IssueStatus::Closed => "closed",
        IssueStatus::Archived => "archived",
    }
}

fn parse_status(s: &str) -> IssueStatus {
    match s {
        "todo" => IssueStatus::Todo,
        "in-progress" => IssueStatus::InProgress,
        "closed" => IssueStatus::Closed,
        "archived" => IssueStatus::Archived,
        _ => IssueStatus::Backlog,
    }
}

fn priority_str(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
        Priority::Critical => "critical",
    }
}

fn parse_priority(s: &str) -> Option<Priority> {
    match s {
        "low" => Some(Priority::Low),
        "medium" => Some(Priority::Medium),
        "high" => Some(Priority::High),
        "critical" => Some(Priority::Critical),
        _ => None,
    }
}

fn row_to_issue(conn: &Connection, row: &rusqlite::Row) -> rusqlite::Result<Issue> {
    let id: String = row.get("id")?;
    let remote_ids_json: String = row.get("remote_ids")?;
    let sync_metadata_json: String = row.get("sync_metadata")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let priority: Option<String> = row.get("priority")?;

    let mut labels_stmt = conn.prepare_cached("SELECT label FROM issue_labels WHERE issue_id = ?1 ORDER BY label")?;
    let labels: BTreeSet<String> = labels_stmt
        .query_map(params![id], |r| r.get::<_, String>(0))?
        .collect::<Result<_, _>>()?;

    let mut deps_stmt =
        conn.prepare_cached("SELECT depends_on_id FROM issue_dependencies WHERE issue_id = ?1 ORDER BY position")?;
    let depends_on: Vec<String> = deps_stmt
        .query_map(params![id], |r| r.get::<_, String>(0))?
        .collect::<Result<_, _>>()?;

    Ok(Issue {
        id,
        title: row.get("title")?,
        content: row.get("content")?,
        status: parse_status(&row.get::<_, String>("status")?),
        priority: priority.as_deref().and_then(parse_priority),
        assignee: row.get("assignee")?,
        milestone: row.get("milestone_id")?,
        labels,
        depends_on,
        remote_ids: serde_json::from_str(&remote_ids_json).unwrap_or_default(),
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
        sync_metadata: serde_json::from_str(&sync_metadata_json).unwrap_or_default(),
    })
}

fn sync_children(conn: &Connection, issue: &Issue) -> SyncResult<()> {
    conn.execute("DELETE FROM issue_labels WHERE issue_id = ?1", params![issue.id]).map_err(|e| db_err("clearing labels", e))?;
    for label in &issue.labels {
        conn.execute(
            "INSERT INTO issue_labels (issue_id, label) VALUES (?1, ?2)",
            params![issue.id, label],
        )
        .map_err(|e| db_err("inserting label", e))?;
    }

    conn.execute("DELETE FROM issue_dependencies WHERE issue_id = ?1", params![issue.id])
        .map_err(|e| db_err("clearing dependencies", e))?;
    for (position, dep) in issue.depends_on.iter().enumerate() {
        conn.execute(
            "INSERT INTO issue_dependencies (issue_id, depends_on_id, position) VALUES (?1, ?2, ?3)",
            params![issue.id, dep, position as i64],
        )
        .map_err(|e| db_err("inserting dependency", e))?;
    }
    Ok(())
}

/// Inserts a new issue plus its labels and dependencies. Fails with
/// `duplicate_entity` if `issue.id` already exists.
pub fn create(conn: &Connection, issue: &Issue) -> SyncResult<()> {
    let exists: bool = conn
        .query_row("SELECT 1 FROM issues WHERE id = ?1", params![issue.id], |_| Ok(true))
        .optional()
        .map_err(|e| db_err("checking issue existence", e))?
        .unwrap_or(false);
    if exists {
        return Err(SyncError::new(SyncErrorType::DuplicateEntity, format!("issue {} already exists", issue.id))
            .with_entity("issue", issue.id.clone()));
    }

    conn.execute(
        "INSERT INTO issues (id, title, content, status, priority, assignee, milestone_id, project_id, remote_ids, sync_metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9, ?10, ?11)",
        params![
            issue.id,
            issue.title,
            issue.content,
            status_str(issue.status),
            issue.priority.map(priority_str),
            issue.assignee,
            issue.milestone,
            serde_json::to_string(&issue.remote_ids).unwrap_or_default(),
            serde_json::to_string(&issue.sync_metadata).unwrap_or_default(),
            issue.created_at.to_rfc3339(),
            issue.updated_at.to_rfc3339(),
        ],
    )
    .map_err(|e| db_err("creating issue", e))?;

    sync_children(conn, issue)?;
    Ok(())
}

/// Updates an existing issue plus its labels and dependencies. Returns
/// `false` if no row with `issue.id` exists.
pub fn update(conn: &Connection, issue: &Issue) -> SyncResult<bool> {
    let rows = conn
        .execute(
            "UPDATE issues SET title = ?2, content = ?3, status = ?4, priority = ?5, assignee = ?6,
                milestone_id = ?7, remote_ids = ?8, sync_metadata = ?9 WHERE id = ?1",
            params![
                issue.id,
                issue.title,
                issue.content,
                status_str(issue.status),
                issue.priority.map(priority_str),
                issue.assignee,
                issue.milestone,
                serde_json::to_string(&issue.remote_ids).unwrap_or_default(),
                serde_json::to_string(&issue.sync_metadata).unwrap_or_default(),
            ],
        )
        .map_err(|e| db_err("updating issue", e))?;

    if rows == 0 {
        return Ok(false);
    }
    sync_children(conn, issue)?;
    Ok(true)
}

pub fn get(conn: &Connection, id: &str) -> SyncResult<Option<Issue>> {
    conn.query_row("SELECT * FROM issues WHERE id = ?1", params![id], |row| row_to_issue(conn, row))
        .optional()
        .map_err(|e| db_err("fetching issue", e))
}

/// Lists issues, optionally filtered by milestone id. Filtering is a
/// pass-through: an absent filter returns every issue.
pub fn list(conn: &Connection, milestone_id: Option<&str>) -> SyncResult<Vec<Issue>> {
    let mut stmt = match milestone_id {
        Some(_) => conn
            .prepare("SELECT * FROM issues WHERE milestone_id = ?1 ORDER BY id")
            .map_err(|e| db_err("listing issues", e))?,
        None => conn.prepare("SELECT * FROM issues ORDER BY id").map_err(|e| db_err("listing issues", e))?,
    };

    let rows = match milestone_id {
        Some(id) => stmt
            .query_map(params![id], |row| row_to_issue(conn, row))
            .map_err(|e| db_err("listing issues", e))?
            .collect::<Result<Vec<_>, _>>(),
        None => stmt
            .query_map([], |row| row_to_issue(conn, row))
            .map_err(|e| db_err("listing issues", e))?
            .collect::<Result<Vec<_>, _>>(),
    }
    .map_err(|e| db_err("listing issues", e))?;
    Ok(rows)
}

/// Cascades to `issue_labels`, `issue_dependencies` (both directions
/// via the schema's FK), `comments`, and `remote_links`.
pub fn delete(conn: &Connection, id: &str) -> SyncResult<bool> {
    conn.execute("DELETE FROM remote_links WHERE local_entity_id = ?1", params![id])
        .map_err(|e| db_err("deleting issue remote links", e))?;
    let rows = conn.execute("DELETE FROM issues WHERE id = ?1", params![id]).map_err(|e| db_err("deleting issue", e))?;
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
    fn create_then_get_round_trips_labels_and_dependencies() {
        let conn = conn();
        let mut dep = Issue::new("i-0", "Dependency", IssueStatus::Backlog).unwrap();
        create(&conn, &dep).unwrap();
        dep.status = IssueStatus::Closed;

        let mut issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        issue.labels.insert("bug".to_string());
        issue.labels.insert("urgent".to_string());
        issue.add_dependency("i-0").unwrap();
        create(&conn, &issue).unwrap();

        let fetched = get(&conn, "i-1").unwrap().unwrap();
        assert_eq!(fetched.labels.len(), 2);
        assert_eq!(fetched.depends_on, vec!["i-0".to_string()]);
    }

    #[test]
    fn update_resynchronizes_labels() {
        let conn = conn();
        let mut issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        issue.labels.insert("bug".to_string());
        create(&conn, &issue).unwrap();

        issue.labels.clear();
        issue.labels.insert("feature".to_string());
        assert!(update(&conn, &issue).unwrap());

        let fetched = get(&conn, "i-1").unwrap().unwrap();
        assert_eq!(fetched.labels.len(), 1);
        assert!(fetched.labels.contains("feature"));
    }

    #[test]
    fn list_filters_by_milestone() {
        let conn = conn();
        let milestone = roadmap_model::Milestone::new("m-1", "v1").unwrap();
        crate::milestones::create(&conn, &milestone).unwrap();

        let mut issue = Issue::new("i-1", "In milestone", IssueStatus::Todo).unwrap();
        issue.milestone = Some("m-1".to_string());
        create(&conn, &issue).unwrap();

        let other = Issue::new("i-2", "Not in milestone", IssueStatus::Todo).unwrap();
        create(&conn, &other).unwrap();

        let filtered = list(&conn, Some("m-1")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "i-1");

        assert_eq!(list(&conn, None).unwrap().len(), 2);
    }

    #[test]
    fn create_is_fail_if_exists() {
        let conn = conn();
        let issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        create(&conn, &issue).unwrap();
        let err = create(&conn, &issue).unwrap_err();
        assert_eq!(err.category, SyncErrorType::DuplicateEntity);
    }
}
