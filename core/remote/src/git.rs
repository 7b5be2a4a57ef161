//! The `git` backend: for projects that sync only through the working
//! tree's own version control and have no separate issue tracker to
//! reconcile against. Every operation is a no-op returning empty
//! results rather than an error, so the orchestrator can run its normal
//! pull/push passes unconditionally without a special "no remote"
//! branch.

use std::collections::HashMap;

use async_trait::async_trait;
use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use roadmap_model::{SyncIssue, SyncMilestone};

use crate::port::{IssueFilter, IssuePayload, MilestonePayload, RemoteBackendPort};

#[derive(Debug, Default)]
pub struct GitBackend;

impl GitBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteBackendPort for GitBackend {
    async fn authenticate(&self) -> SyncResult<()> {
        Ok(())
    }

    async fn list_issues(&self, _filter: Option<IssueFilter>) -> SyncResult<HashMap<String, SyncIssue>> {
        Ok(HashMap::new())
    }

    async fn get_issue(&self, remote_id: &str) -> SyncResult<SyncIssue> {
        Err(SyncError::resource_not_found_error("issue", remote_id))
    }

    async fn create_issue(&self, _payload: IssuePayload) -> SyncResult<SyncIssue> {
        Err(SyncError::new(SyncErrorType::UnknownError, "the git backend has no remote issue tracker to create against"))
    }

    async fn update_issue(&self, remote_id: &str, _payload: IssuePayload) -> SyncResult<SyncIssue> {
        Err(SyncError::resource_not_found_error("issue", remote_id))
    }

    async fn list_milestones(&self) -> SyncResult<HashMap<String, SyncMilestone>> {
        Ok(HashMap::new())
    }

    async fn get_milestone(&self, remote_id: &str) -> SyncResult<SyncMilestone> {
        Err(SyncError::resource_not_found_error("milestone", remote_id))
    }

    async fn create_milestone(&self, _payload: MilestonePayload) -> SyncResult<SyncMilestone> {
        Err(SyncError::new(SyncErrorType::UnknownError, "the git backend has no remote issue tracker to create against"))
    }

    async fn update_milestone(&self, remote_id: &str, _payload: MilestonePayload) -> SyncResult<SyncMilestone> {
        Err(SyncError::resource_not_found_error("milestone", remote_id))
    }

    async fn delete_milestone(&self, remote_id: &str) -> SyncResult<()> {
        Err(SyncError::resource_not_found_error("milestone", remote_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_operations_return_empty_without_error() {
        let backend = GitBackend::new();
        assert!(backend.authenticate().await.is_ok());
        assert_eq!(backend.list_issues(None).await.unwrap().len(), 0);
        assert_eq!(backend.list_milestones().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn get_issue_is_not_found() {
        let backend = GitBackend::new();
        let err = backend.get_issue("1").await.unwrap_err();
        assert_eq!(err.category, SyncErrorType::ResourceNotFound);
    }
}
