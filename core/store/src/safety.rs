//! Safety probe consulted before any managed-file write: refuses writes
//! while unresolved VCS conflict markers are present in any managed
//! file, or while the connection itself is unhealthy.

use rusqlite::Connection;

use roadmap_common::SyncResult;

use crate::state;

const CONFLICT_MARKERS: [&str; 3] = ["<<<<<<<", "=======", ">>>>>>>"];

fn has_conflict_markers(content: &str) -> bool {
    CONFLICT_MARKERS.iter().any(|marker| content.contains(marker))
}

fn connection_is_healthy(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok()
}

/// Scans `files` (path, content) pairs for conflict marker sentinels.
/// Any hit sets `git_conflicts_detected = "true"` and records the
/// offending paths (JSON array) under `conflict_files`; an all-clear
/// scan clears both keys. Returns `(ok, reason)`.
pub fn is_safe_for_writes<'a>(
    conn: &Connection,
    files: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> SyncResult<(bool, Option<String>)> {
    if !connection_is_healthy(conn) {
        return Ok((false, Some("store connection is unhealthy".to_string())));
    }

    let conflicted: Vec<&str> = files
        .into_iter()
        .filter_map(|(path, content)| has_conflict_markers(content).then_some(path))
        .collect();

    if conflicted.is_empty() {
        state::set(conn, "git_conflicts_detected", "false")?;
        state::set(conn, "conflict_files", "[]")?;
        return Ok((true, None));
    }

    state::set(conn, "git_conflicts_detected", "true")?;
    state::set(conn, "conflict_files", &serde_json::to_string(&conflicted).unwrap_or_default())?;
    Ok((
        false,
        Some(format!("unresolved conflict markers in: {}", conflicted.join(", "))),
    ))
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
    fn clean_files_are_safe() {
        let conn = conn();
        let (ok, reason) = is_safe_for_writes(&conn, vec![("issues/1.md", "no markers here")]).unwrap();
        assert!(ok);
        assert!(reason.is_none());
        assert_eq!(state::get(&conn, "git_conflicts_detected").unwrap().unwrap(), "false");
    }

    #[test]
    fn conflict_markers_refuse_writes_and_record_paths() {
        let conn = conn();
        let conflicted = "title: x\n<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> branch\n";
        let (ok, reason) = is_safe_for_writes(&conn, vec![("issues/1.md", conflicted)]).unwrap();
        assert!(!ok);
        assert!(reason.is_some());
        assert_eq!(state::get(&conn, "git_conflicts_detected").unwrap().unwrap(), "true");
        let files = state::get(&conn, "conflict_files").unwrap().unwrap();
        assert!(files.contains("issues/1.md"));
    }

    #[test]
    fn a_half_applied_merge_with_a_single_marker_is_flagged() {
        let conn = conn();
        let half_applied = "title: x\n<<<<<<< HEAD\nours\ncontent continues\n";
        let (ok, reason) = is_safe_for_writes(&conn, vec![("issues/1.md", half_applied)]).unwrap();
        assert!(!ok);
        assert!(reason.is_some());
        assert_eq!(state::get(&conn, "git_conflicts_detected").unwrap().unwrap(), "true");
    }

    #[test]
    fn a_clean_scan_clears_a_previous_conflict_flag() {
        let conn = conn();
        is_safe_for_writes(&conn, vec![("issues/1.md", "<<<<<<<\n=======\n>>>>>>>")]).unwrap();
        let (ok, _) = is_safe_for_writes(&conn, vec![("issues/1.md", "clean now")]).unwrap();
        assert!(ok);
        assert_eq!(state::get(&conn, "git_conflicts_detected").unwrap().unwrap(), "false");
    }
}
