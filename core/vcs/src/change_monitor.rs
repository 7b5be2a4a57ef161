//! Detects file changes via `git diff`-equivalent tree comparison and
//! tracks the last-synced commit, so the Sync Orchestrator can choose an
//! incremental pass over a full filesystem scan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use git2::{Delta, ObjectType, Repository, TreeWalkMode, TreeWalkResult};
use tracing::debug;

const LEGACY_MARKER_FILE: &str = "sync_git_state.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

/// Managed subtrees: `issues/`, `milestones/`, `projects/`, and each of
/// their `archive/` mirrors. Generalizes the original source's
/// issues-only filter to all three entity types.
fn is_managed_path(path: &str) -> bool {
    const SEGMENTS: [&str; 3] = ["issues/", "milestones/", "projects/"];
    SEGMENTS.iter().any(|seg| path.contains(seg) || path.contains(&format!("archive/{seg}")))
}

/// Wraps a repository discovered at (or above) `root`. Degrades to a
/// no-op when `root` is not a VCS checkout — every operation then
/// returns an empty change set and logs at debug level, never raising.
pub struct ChangeMonitor {
    repo: Option<Repository>,
    root: PathBuf,
    cached_current_commit: Option<String>,
}

impl ChangeMonitor {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let repo = match Repository::discover(&root) {
            Ok(repo) => Some(repo),
            Err(err) => {
                debug!(root = %root.display(), error = %err, "not a git repository, change monitor degrades to no-op");
                None
            }
        };
        Self { repo, root, cached_current_commit: None }
    }

    /// Reads the commit SHA from the legacy `sync_git_state.txt` marker
    /// file, if present. Callers consult this exactly once, on first
    /// open, when the store's `last_synced_commit` key is absent.
    pub fn read_legacy_marker(&self) -> Option<String> {
        let path = self.root.join(LEGACY_MARKER_FILE);
        std::fs::read_to_string(path).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }

    fn current_commit(&mut self) -> Option<String> {
        if let Some(commit) = &self.cached_current_commit {
            return Some(commit.clone());
        }
        let repo = self.repo.as_ref()?;
        // `head()` resolves through a detached HEAD directly to the
        // commit OID, no branch name required.
        let head = repo.head().ok()?;
        let oid = head.target().or_else(|| head.peel_to_commit().ok().map(|c| c.id()))?;
        let sha = oid.to_string();
        self.cached_current_commit = Some(sha.clone());
        Some(sha)
    }

    /// Returns `path -> change-type` for every managed path that
    /// changed between `last_synced_commit` and current HEAD. `None`
    /// means "never synced" and yields every tracked managed file as
    /// `Added`. Returns an empty map if HEAD already equals the stored
    /// marker, or if the working directory is not a git checkout.
    pub fn detect_changes(&mut self, last_synced_commit: Option<&str>) -> HashMap<String, ChangeType> {
        let Some(current) = self.current_commit() else {
            debug!("unable to resolve current commit, returning no changes");
            return HashMap::new();
        };

        if Some(current.as_str()) == last_synced_commit {
            debug!(current = %current, "already synced to current commit");
            return HashMap::new();
        }

        let repo = self.repo.as_ref().expect("current_commit() only returns Some when repo is present");

        let changes = match last_synced_commit {
            None => Self::all_tracked_files(repo),
            Some(base) => Self::diff_between(repo, base, &current),
        };

        let filtered: HashMap<String, ChangeType> =
            changes.into_iter().filter(|(path, _)| is_managed_path(path)).collect();

        debug!(current = %current, previous = ?last_synced_commit, change_count = filtered.len(), "detected file changes");
        filtered
    }

    /// Records that `current HEAD` is now the synced commit. The actual
    /// file-to-store sync is the Orchestrator's job; this just returns
    /// the marker value for the caller to persist.
    pub fn sync_to_store(&mut self) -> Option<String> {
        self.current_commit()
    }

    /// Forgets the memoized HEAD; a test/debug hook.
    pub fn clear_cache(&mut self) {
        self.cached_current_commit = None;
    }

    fn all_tracked_files(repo: &Repository) -> HashMap<String, ChangeType> {
        let mut out = HashMap::new();
        let Ok(head) = repo.head() else { return out };
        let Ok(commit) = head.peel_to_commit() else { return out };
        let Ok(tree) = commit.tree() else { return out };

        let _ = tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    out.insert(format!("{dir}{name}"), ChangeType::Added);
                }
            }
            TreeWalkResult::Ok
        });

        out
    }

    fn diff_between(repo: &Repository, base_sha: &str, current_sha: &str) -> HashMap<String, ChangeType> {
        let mut out = HashMap::new();

        let base_tree = Self::tree_for_sha(repo, base_sha);
        let current_tree = Self::tree_for_sha(repo, current_sha);

        let Ok(diff) = repo.diff_tree_to_tree(base_tree.as_ref(), current_tree.as_ref(), None) else {
            return out;
        };

        let _ = diff.foreach(
            &mut |delta, _progress| {
                let path = delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(|p| p.to_string_lossy().to_string());

                if let Some(path) = path {
                    let change = match delta.status() {
                        Delta::Added | Delta::Copied => ChangeType::Added,
                        Delta::Deleted => ChangeType::Deleted,
                        _ => ChangeType::Modified,
                    };
                    out.insert(path, change);
                }
                true
            },
            None,
            None,
            None,
        );

        out
    }

    fn tree_for_sha<'repo>(repo: &'repo Repository, sha: &str) -> Option<git2::Tree<'repo>> {
        let oid = git2::Oid::from_str(sha).ok()?;
        repo.find_commit(oid).ok()?.tree().ok()
    }
}

/// Exposed for tests and callers who want to check a path's managed-ness
/// without going through a `ChangeMonitor`.
pub fn managed_path(path: &str) -> bool {
    is_managed_path(path)
}
