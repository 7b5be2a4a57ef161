//! The local `Milestone` entity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneStatus {
    Open,
    Closed,
}

/// A locally-owned milestone. Name uniqueness among non-archived
/// milestones is enforced by the Local Store, not here. `progress` is
/// always a derived read (closed / total child issues) and is never
/// persisted on this struct to avoid a second write path drifting from
/// the issues table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub headline: String,
    pub due_date: Option<DateTime<Utc>>,
    pub status: MilestoneStatus,
    pub project: Option<String>,
    #[serde(default)]
    pub remote_ids: HashMap<String, String>,
}

impl Milestone {
    /// # Errors
    /// Returns `validation_error` if `name` is empty.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> SyncResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SyncError::new(SyncErrorType::ValidationError, "Milestone.name is required"));
        }
        Ok(Self {
            id: id.into(),
            name,
            headline: String::new(),
            due_date: None,
            status: MilestoneStatus::Open,
            project: None,
            remote_ids: HashMap::new(),
        })
    }
}

impl crate::entity::Entity for Milestone {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.name
    }

    fn content(&self) -> &str {
        &self.headline
    }

    fn labels(&self) -> Vec<String> {
        Vec::new()
    }

    fn remote_ids(&self) -> &HashMap<String, String> {
        &self.remote_ids
    }
}

/// Computes the derived progress ratio (closed / total), `0.0` when
/// there are no child issues.
pub fn progress(closed_count: usize, total_count: usize) -> f64 {
    if total_count == 0 {
        0.0
    } else {
        closed_count as f64 / total_count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        let err = Milestone::new("m-1", "").unwrap_err();
        assert_eq!(err.category, SyncErrorType::ValidationError);
    }

    #[test]
    fn progress_with_no_children_is_zero() {
        assert_eq!(progress(0, 0), 0.0);
    }

    #[test]
    fn progress_is_closed_over_total() {
        assert_eq!(progress(2, 4), 0.5);
    }
}
