//! Sync Orchestrator: keeps the Local Store caught up with the managed
//! `.roadmap` directory, choosing between an incremental pass (only
//! changed files) and a full rebuild (clear and reparse everything)
//! based on how much has drifted since the last run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use roadmap_model::{Issue, Milestone, Project};
use roadmap_parser::{calculate_file_hash, infer_entity_kind, parse, EntityKind, ParsedEntity};
use roadmap_store::Store;

const MANAGED_PATTERNS: [EntityKind; 3] = [EntityKind::Project, EntityKind::Milestone, EntityKind::Issue];
const LAST_INCREMENTAL_SYNC_KEY: &str = "last_incremental_sync";
const LAST_FULL_REBUILD_KEY: &str = "last_full_rebuild";
const DEFAULT_REBUILD_THRESHOLD_PERCENT: u32 = 50;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IncrementalStats {
    pub files_checked: usize,
    pub files_changed: usize,
    pub files_synced: usize,
    pub files_failed: usize,
    pub sync_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RebuildStats {
    pub files_processed: usize,
    pub files_changed: usize,
    pub files_synced: usize,
    pub files_failed: usize,
    pub rebuild_time: Option<DateTime<Utc>>,
}

/// Recursively collects every `.md` file under `root`, in the fixed
/// dependency order `projects` -> `milestones` -> `issues` (files whose
/// path doesn't fall under any managed subtree are skipped).
fn managed_files(root: &Path) -> Vec<PathBuf> {
    let mut by_kind: [Vec<PathBuf>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    walk(root, &mut by_kind);
    let mut all = Vec::new();
    for (i, kind) in MANAGED_PATTERNS.iter().enumerate() {
        let _ = kind;
        all.append(&mut by_kind[i]);
    }
    all
}

fn walk(dir: &Path, by_kind: &mut [Vec<PathBuf>; 3]) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, by_kind);
        } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
            match infer_entity_kind(&path) {
                Some(EntityKind::Project) => by_kind[0].push(path),
                Some(EntityKind::Milestone) => by_kind[1].push(path),
                Some(EntityKind::Issue) => by_kind[2].push(path),
                None => {}
            }
        }
    }
}

fn has_file_changed(store: &Store, path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    let hash = calculate_file_hash(path);
    let path_str = path.to_string_lossy().to_string();
    store.has_file_changed(&path_str, &hash).unwrap_or(true)
}

/// Parses `path` and writes it into the Local Store (update-if-present,
/// create otherwise), then records the file's current hash/size/mtime
/// in `file_sync_state`. Returns whether the write succeeded; failures
/// are logged, never propagated, so one bad file doesn't stall the pass.
fn sync_file(store: &Store, path: &Path) -> bool {
    let entity = match parse(path) {
        Ok(entity) => entity,
        Err(err) => {
            tracing::warn!(file = %path.display(), error = %err, "failed to parse managed file");
            return false;
        }
    };

    let write_result = match &entity {
        ParsedEntity::Project(project) => write_project(store, project),
        ParsedEntity::Milestone(milestone) => write_milestone(store, milestone),
        ParsedEntity::Issue(issue) => write_issue(store, issue),
    };

    if let Err(err) = write_result {
        tracing::warn!(file = %path.display(), error = %err, "failed to write parsed entity to the local store");
        return false;
    }

    let Some(metadata) = roadmap_parser::extract_file_metadata(path) else {
        return true;
    };
    let state = roadmap_model::FileSyncState::new(path.to_string_lossy().to_string(), metadata.hash, metadata.size, metadata.modified_time);
    if let Err(err) = store.upsert_file_sync_state(&state) {
        tracing::warn!(file = %path.display(), error = %err, "failed to record file sync state");
        return false;
    }
    true
}

fn write_project(store: &Store, project: &Project) -> roadmap_common::SyncResult<()> {
    if store.update_project(project)? {
        Ok(())
    } else {
        store.create_project(project)
    }
}

fn write_milestone(store: &Store, milestone: &Milestone) -> roadmap_common::SyncResult<()> {
    if store.update_milestone(milestone)? {
        Ok(())
    } else {
        store.create_milestone(milestone)
    }
}

fn write_issue(store: &Store, issue: &Issue) -> roadmap_common::SyncResult<()> {
    if store.update_issue(issue)? {
        Ok(())
    } else {
        store.create_issue(issue)
    }
}

pub struct SyncOrchestrator;

impl SyncOrchestrator {
    pub fn new() -> Self {
        Self
    }

    /// Walks the three managed patterns once, syncing only files whose
    /// content hash has drifted from what's on record.
    pub fn sync_directory_incremental(&self, store: &Store, roadmap_dir: &Path) -> IncrementalStats {
        let mut stats = IncrementalStats { sync_time: Some(Utc::now()), ..Default::default() };

        if !roadmap_dir.exists() {
            tracing::warn!(dir = %roadmap_dir.display(), "roadmap directory not found");
            return stats;
        }

        for path in managed_files(roadmap_dir) {
            stats.files_checked += 1;
            if has_file_changed(store, &path) {
                stats.files_changed += 1;
                if sync_file(store, &path) {
                    stats.files_synced += 1;
                } else {
                    stats.files_failed += 1;
                }
            }
        }

        if let Some(sync_time) = stats.sync_time {
            if let Err(err) = store.set_state(LAST_INCREMENTAL_SYNC_KEY, &sync_time.to_rfc3339()) {
                tracing::warn!(error = %err, "failed to update last_incremental_sync checkpoint");
            }
        }

        tracing::info!(
            files_checked = stats.files_checked,
            files_changed = stats.files_changed,
            files_synced = stats.files_synced,
            files_failed = stats.files_failed,
            "incremental sync completed"
        );
        stats
    }

    /// Clears `file_sync_state` and `issues` (project/milestone rows
    /// survive — reconstructing the issue graph against existing
    /// parents is the common and cheapest case), then reparses every
    /// managed file from scratch.
    pub fn full_rebuild_from_git(&self, store: &mut Store, roadmap_dir: &Path) -> RebuildStats {
        let mut stats = RebuildStats { rebuild_time: Some(Utc::now()), ..Default::default() };

        if !roadmap_dir.exists() {
            tracing::warn!(dir = %roadmap_dir.display(), "roadmap directory not found");
            return stats;
        }

        let cleared = store.transaction(|txn| {
            txn.execute("DELETE FROM file_sync_state", [])
                .map_err(|e| roadmap_common::SyncError::new(roadmap_common::SyncErrorType::DatabaseError, format!("clearing file_sync_state: {e}")))?;
            txn.execute("DELETE FROM issues", [])
                .map_err(|e| roadmap_common::SyncError::new(roadmap_common::SyncErrorType::DatabaseError, format!("clearing issues: {e}")))?;
            Ok(())
        });
        if let Err(err) = cleared {
            tracing::error!(error = %err, "full rebuild failed while clearing database state");
            return stats;
        }

        tracing::info!("starting full rebuild from managed files");

        for path in managed_files(roadmap_dir) {
            stats.files_processed += 1;
            stats.files_changed += 1;
            if sync_file(store, &path) {
                stats.files_synced += 1;
            } else {
                stats.files_failed += 1;
            }
        }

        if let Some(rebuild_time) = stats.rebuild_time {
            if let Err(err) = store.set_state(LAST_FULL_REBUILD_KEY, &rebuild_time.to_rfc3339()) {
                tracing::warn!(error = %err, "failed to update last_full_rebuild checkpoint");
            }
        }

        tracing::info!(
            files_processed = stats.files_processed,
            files_synced = stats.files_synced,
            files_failed = stats.files_failed,
            "full rebuild completed"
        );
        stats
    }

    /// Fail-safe toward a rebuild: any error while counting, or the
    /// absence of a prior incremental-sync checkpoint, says "yes".
    pub fn should_do_full_rebuild(&self, store: &Store, roadmap_dir: &Path, threshold_percent: Option<u32>) -> bool {
        let threshold_percent = threshold_percent.unwrap_or(DEFAULT_REBUILD_THRESHOLD_PERCENT);

        let files = managed_files(roadmap_dir);
        let total = files.len();
        let changed = files.iter().filter(|p| has_file_changed(store, p)).count();

        match store.get_state(LAST_INCREMENTAL_SYNC_KEY) {
            Ok(None) => {
                tracing::info!("no previous sync checkpoint found, triggering full rebuild");
                true
            }
            Ok(Some(_)) => {
                if total > 0 && (changed * 100) >= total * threshold_percent as usize {
                    tracing::info!(changed, total, "many files changed, triggering full rebuild");
                    true
                } else {
                    false
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to determine rebuild strategy, defaulting to rebuild");
                true
            }
        }
    }
}

impl Default for SyncOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    const ISSUE_MD: &str = "---\nid: i-1\ntitle: Fix the thing\nstatus: todo\n---\nBody text.\n";

    #[test]
    fn incremental_sync_creates_issue_from_new_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "issues/i-1.md", ISSUE_MD);

        let store = Store::in_memory().unwrap();
        let orchestrator = SyncOrchestrator::new();
        let stats = orchestrator.sync_directory_incremental(&store, tmp.path());

        assert_eq!(stats.files_checked, 1);
        assert_eq!(stats.files_synced, 1);
        assert!(store.get_issue("i-1").unwrap().is_some());
    }

    #[test]
    fn incremental_sync_skips_unchanged_files_on_second_pass() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "issues/i-1.md", ISSUE_MD);

        let store = Store::in_memory().unwrap();
        let orchestrator = SyncOrchestrator::new();
        orchestrator.sync_directory_incremental(&store, tmp.path());
        let second = orchestrator.sync_directory_incremental(&store, tmp.path());

        assert_eq!(second.files_changed, 0);
    }

    #[test]
    fn missing_directory_returns_empty_stats_without_error() {
        let store = Store::in_memory().unwrap();
        let orchestrator = SyncOrchestrator::new();
        let stats = orchestrator.sync_directory_incremental(&store, Path::new("/nonexistent/path"));
        assert_eq!(stats.files_checked, 0);
    }

    #[test]
    fn should_do_full_rebuild_without_checkpoint_is_true() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "issues/i-1.md", ISSUE_MD);
        let store = Store::in_memory().unwrap();
        let orchestrator = SyncOrchestrator::new();
        assert!(orchestrator.should_do_full_rebuild(&store, tmp.path(), None));
    }

    #[test]
    fn should_do_full_rebuild_is_false_after_clean_incremental_sync() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "issues/i-1.md", ISSUE_MD);
        let store = Store::in_memory().unwrap();
        let orchestrator = SyncOrchestrator::new();
        orchestrator.sync_directory_incremental(&store, tmp.path());
        assert!(!orchestrator.should_do_full_rebuild(&store, tmp.path(), None));
    }

    #[test]
    fn full_rebuild_reparses_every_managed_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "issues/i-1.md", ISSUE_MD);
        let mut store = Store::in_memory().unwrap();
        let orchestrator = SyncOrchestrator::new();
        let stats = orchestrator.full_rebuild_from_git(&mut store, tmp.path());
        assert_eq!(stats.files_synced, 1);
        assert!(store.get_issue("i-1").unwrap().is_some());
    }
}
