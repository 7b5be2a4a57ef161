//! Repairs two historical frontmatter shape drifts, idempotently, both
//! per-file and in batch over a whole managed tree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{info, warn};

const DELIMITER: &str = "---";

/// `git_commits` was once a list of bare commit-hash strings; the
/// current shape is a list of `{hash: ...}` records. Idempotent: already
/// normalized entries pass through unchanged.
fn fix_git_commits(frontmatter: &mut Mapping) {
    let key = Value::String("git_commits".to_string());
    let Some(Value::Sequence(commits)) = frontmatter.get(&key) else {
        return;
    };

    let fixed: Vec<Value> = commits
        .iter()
        .map(|commit| match commit {
            Value::String(hash) => {
                let mut record = Mapping::new();
                record.insert(Value::String("hash".to_string()), Value::String(hash.clone()));
                Value::Mapping(record)
            }
            other => other.clone(),
        })
        .collect();

    frontmatter.insert(key, Value::Sequence(fixed));
}

/// `git_branches` was once a list of `{name: ...}` records; the current
/// shape is a list of bare branch-name strings. Idempotent.
fn fix_git_branches(frontmatter: &mut Mapping) {
    let key = Value::String("git_branches".to_string());
    let Some(Value::Sequence(branches)) = frontmatter.get(&key) else {
        return;
    };

    let fixed: Vec<Value> = branches
        .iter()
        .map(|branch| match branch {
            Value::Mapping(map) => match map.get(Value::String("name".to_string())) {
                Some(Value::String(name)) => Value::String(name.clone()),
                _ => Value::String(format!("{branch:?}")),
            },
            Value::String(_) => branch.clone(),
            other => Value::String(format!("{other:?}")),
        })
        .collect();

    frontmatter.insert(key, Value::Sequence(fixed));
}

/// Applies both repairs in place.
pub fn normalize_git_data(frontmatter: &mut Mapping) {
    fix_git_commits(frontmatter);
    fix_git_branches(frontmatter);
}

/// Repairs a single file's frontmatter on disk, rewriting only if the
/// normalized form differs from what was read. Returns `Ok(true)` if the
/// file was rewritten, `Ok(false)` if it was already normalized (or had
/// no frontmatter to repair).
pub fn repair_file(path: &Path) -> Result<bool, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;

    if !content.starts_with(DELIMITER) {
        return Ok(false);
    }

    let parts: Vec<&str> = content.splitn(3, DELIMITER).collect();
    if parts.len() < 3 {
        return Err(format!("{}: malformed frontmatter block", path.display()));
    }

    let (frontmatter_str, markdown) = (parts[1], parts[2]);

    let mut frontmatter: Mapping = match serde_yaml::from_str::<Value>(frontmatter_str) {
        Ok(Value::Mapping(map)) => map,
        Ok(_) => return Err(format!("{}: frontmatter is not a mapping", path.display())),
        Err(err) => return Err(format!("{}: {err}", path.display())),
    };

    let before = frontmatter.clone();
    normalize_git_data(&mut frontmatter);

    if frontmatter == before {
        return Ok(false);
    }

    let rendered = serde_yaml::to_string(&frontmatter).map_err(|e| format!("{}: {e}", path.display()))?;
    let fixed_content = format!("---\n{rendered}---{markdown}");

    std::fs::write(path, fixed_content).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(true)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairReport {
    pub fixed_files: Vec<String>,
    pub unchanged_count: usize,
    pub errors: Vec<String>,
}

/// Walks every markdown file under `root`, applying both frontmatter
/// repairs. Never raises; a single file's repair failure is recorded in
/// `errors` and the walk continues.
pub fn repair_tree(root: &Path) -> RepairReport {
    let mut report = RepairReport::default();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                report.errors.push(format!("{}: {err}", dir.display()));
                continue;
            }
        };

        for entry in entries.flatten() {
            let path: PathBuf = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }

            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();

            match repair_file(&path) {
                Ok(true) => {
                    info!(file = %rel, "repaired frontmatter shape drift");
                    report.fixed_files.push(rel);
                }
                Ok(false) => report.unchanged_count += 1,
                Err(err) => {
                    warn!(file = %rel, error = %err, "failed to repair file");
                    report.errors.push(err);
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping_from(yaml: &str) -> Mapping {
        match serde_yaml::from_str::<Value>(yaml).unwrap() {
            Value::Mapping(m) => m,
            _ => panic!("not a mapping"),
        }
    }

    #[test]
    fn fixes_string_commits_into_hash_records() {
        let mut map = mapping_from("git_commits:\n  - abc123\n  - def456\n");
        normalize_git_data(&mut map);
        let Value::Sequence(commits) = map.get(Value::String("git_commits".into())).unwrap() else {
            panic!("expected sequence");
        };
        assert!(matches!(commits[0], Value::Mapping(_)));
    }

    #[test]
    fn repair_is_idempotent() {
        let mut map = mapping_from("git_commits:\n  - hash: abc123\n");
        let before = map.clone();
        normalize_git_data(&mut map);
        assert_eq!(map, before);
    }

    #[test]
    fn fixes_branch_records_into_strings() {
        let mut map = mapping_from("git_branches:\n  - name: main\n  - name: dev\n");
        normalize_git_data(&mut map);
        let Value::Sequence(branches) = map.get(Value::String("git_branches".into())).unwrap() else {
            panic!("expected sequence");
        };
        assert_eq!(branches[0], Value::String("main".to_string()));
    }

    #[test]
    fn repair_tree_walks_subdirectories_and_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let issues = dir.path().join("issues");
        std::fs::create_dir(&issues).unwrap();

        std::fs::write(
            issues.join("1.md"),
            "---\ngit_commits:\n  - abc123\n---\nbody\n",
        )
        .unwrap();
        std::fs::write(issues.join("2.md"), "---\ntitle: fine\n---\nbody\n").unwrap();
        std::fs::write(issues.join("not-managed.txt"), "ignored").unwrap();

        let report = repair_tree(dir.path());
        assert_eq!(report.fixed_files.len(), 1);
        assert_eq!(report.unchanged_count, 1);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn repair_tree_records_error_for_malformed_block_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.md"), "---\ntitle: [oops\n---\nbody\n").unwrap();
        std::fs::write(dir.path().join("ok.md"), "---\ntitle: fine\n---\nbody\n").unwrap();

        let report = repair_tree(dir.path());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.unchanged_count, 1);
    }
}
