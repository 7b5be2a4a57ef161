//! The local `Issue` entity.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueStatus {
    Backlog,
    Todo,
    InProgress,
    Closed,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// A locally-owned issue. Identity is an opaque ID minted once and never
/// reused; `labels` has set semantics (insertion order is not preserved),
/// `depends_on` is ordered and may not self-reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub status: IssueStatus,
    pub priority: Option<Priority>,
    pub assignee: Option<String>,
    pub milestone: Option<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub remote_ids: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_metadata: HashMap<String, Value>,
}

impl Issue {
    /// Construct a new issue with the required fields, stamping both
    /// timestamps to `now`.
    ///
    /// # Errors
    /// Returns `validation_error` if `title` is empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: IssueStatus) -> SyncResult<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(SyncError::new(SyncErrorType::ValidationError, "Issue.title is required"));
        }
        let now = Utc::now();
        Ok(Self {
            id: id.into(),
            title,
            content: String::new(),
            status,
            priority: None,
            assignee: None,
            milestone: None,
            labels: BTreeSet::new(),
            depends_on: Vec::new(),
            remote_ids: HashMap::new(),
            created_at: now,
            updated_at: now,
            sync_metadata: HashMap::new(),
        })
    }

    /// Adds a dependency, rejecting self-reference. Cycle detection is
    /// intentionally not performed here; it belongs to the dependency
    /// command per the design notes.
    pub fn add_dependency(&mut self, other_id: impl Into<String>) -> SyncResult<()> {
        let other_id = other_id.into();
        if other_id == self.id {
            return Err(SyncError::new(
                SyncErrorType::ValidationError,
                "an issue cannot depend on itself",
            ));
        }
        if !self.depends_on.contains(&other_id) {
            self.depends_on.push(other_id);
        }
        Ok(())
    }

    /// Bumps `updated_at` to `now`, never moving it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

impl crate::entity::Entity for Issue {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn labels(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }

    fn remote_ids(&self) -> &HashMap<String, String> {
        &self.remote_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_title() {
        let err = Issue::new("i-1", "", IssueStatus::Backlog).unwrap_err();
        assert_eq!(err.category, SyncErrorType::ValidationError);
    }

    #[test]
    fn rejects_self_dependency() {
        let mut issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        let err = issue.add_dependency("i-1").unwrap_err();
        assert_eq!(err.category, SyncErrorType::ValidationError);
    }

    #[test]
    fn labels_have_set_semantics() {
        let mut issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        issue.labels.insert("bug".to_string());
        issue.labels.insert("bug".to_string());
        assert_eq!(issue.labels.len(), 1);
    }

    #[test]
    fn touch_never_moves_updated_at_backwards() {
        let mut issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        let original = issue.updated_at;
        issue.updated_at = original + chrono::Duration::days(1);
        issue.touch();
        assert!(issue.updated_at >= original);
    }
}
