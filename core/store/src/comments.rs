//! Comment repository. Comments are append-only from the sync engine's
//! perspective: there is no update, only create/list/delete.

use rusqlite::{params, Connection};

use roadmap_common::SyncResult;

use crate::connection::db_err;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub issue_id: String,
    pub author: Option<String>,
    pub body: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

fn row_to_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
    let created_at: String = row.get("created_at")?;
    Ok(Comment {
        id: row.get("id")?,
        issue_id: row.get("issue_id")?,
        author: row.get("author")?,
        body: row.get("body")?,
        created_at: created_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
    })
}

pub fn create(conn: &Connection, comment: &Comment) -> SyncResult<()> {
    conn.execute(
        "INSERT INTO comments (id, issue_id, author, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![comment.id, comment.issue_id, comment.author, comment.body, comment.created_at.to_rfc3339()],
    )
    .map_err(|e| db_err("creating comment", e))?;
    Ok(())
}

pub fn list_for_issue(conn: &Connection, issue_id: &str) -> SyncResult<Vec<Comment>> {
    let mut stmt = conn
        .prepare("SELECT * FROM comments WHERE issue_id = ?1 ORDER BY created_at")
        .map_err(|e| db_err("listing comments", e))?;
    let rows = stmt
        .query_map(params![issue_id], row_to_comment)
        .map_err(|e| db_err("listing comments", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| db_err("listing comments", e))?;
    Ok(rows)
}

pub fn delete(conn: &Connection, id: &str) -> SyncResult<bool> {
    let rows = conn.execute("DELETE FROM comments WHERE id = ?1", params![id]).map_err(|e| db_err("deleting comment", e))?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues;
    use crate::schema;
    use roadmap_model::{Issue, IssueStatus};

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn create_then_list_round_trips() {
        let conn = conn();
        let issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        issues::create(&conn, &issue).unwrap();

        let comment = Comment {
            id: "c-1".to_string(),
            issue_id: "i-1".to_string(),
            author: Some("alice".to_string()),
            body: "looks good".to_string(),
            created_at: chrono::Utc::now(),
        };
        create(&conn, &comment).unwrap();

        let fetched = list_for_issue(&conn, "i-1").unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].body, "looks good");
    }

    #[test]
    fn deleting_issue_cascades_to_comments() {
        let conn = conn();
        let issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        issues::create(&conn, &issue).unwrap();
        create(
            &conn,
            &Comment {
                id: "c-1".to_string(),
                issue_id: "i-1".to_string(),
                author: None,
                body: "note".to_string(),
                created_at: chrono::Utc::now(),
            },
        )
        .unwrap();

        issues::delete(&conn, "i-1").unwrap();
        assert!(list_for_issue(&conn, "i-1").unwrap().is_empty());
    }
}
