//! `RemoteBackendPort`: the only seam in this workspace permitted to
//! know a remote tracker's wire format. Every method returns
//! `SyncResult<T>` — no HTTP status, no backend-specific exception ever
//! crosses this boundary; implementations translate both into
//! `SyncError` before returning.

use std::collections::HashMap;

use async_trait::async_trait;
use roadmap_common::SyncResult;
use roadmap_model::{SyncIssue, SyncMilestone};

/// Narrows a `list_issues` call. `None` fields are unfiltered.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub state: Option<String>,
    pub labels: Vec<String>,
    pub milestone: Option<String>,
}

/// What `create_issue`/`update_issue` accept. Fields the remote doesn't
/// understand (an unknown label, assignee, or milestone) are silently
/// omitted by the implementation rather than rejected — validating that
/// gap is someone else's job, not the port's.
#[derive(Debug, Clone, Default)]
pub struct IssuePayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub milestone: Option<String>,
    /// Local status, mapped by the implementation to whatever the
    /// remote's own open/closed vocabulary is.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MilestonePayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
    pub status: Option<String>,
}

#[async_trait]
pub trait RemoteBackendPort: Send + Sync {
    /// Verifies credentials by hitting an endpoint that distinguishes
    /// 401/403 from everything else; any other outcome counts as
    /// authenticated since the only thing being checked is that the
    /// credential was accepted.
    async fn authenticate(&self) -> SyncResult<()>;

    async fn list_issues(&self, filter: Option<IssueFilter>) -> SyncResult<HashMap<String, SyncIssue>>;
    async fn get_issue(&self, remote_id: &str) -> SyncResult<SyncIssue>;
    async fn create_issue(&self, payload: IssuePayload) -> SyncResult<SyncIssue>;
    async fn update_issue(&self, remote_id: &str, payload: IssuePayload) -> SyncResult<SyncIssue>;

    async fn list_milestones(&self) -> SyncResult<HashMap<String, SyncMilestone>>;
    async fn get_milestone(&self, remote_id: &str) -> SyncResult<SyncMilestone>;
    async fn create_milestone(&self, payload: MilestonePayload) -> SyncResult<SyncMilestone>;
    async fn update_milestone(&self, remote_id: &str, payload: MilestonePayload) -> SyncResult<SyncMilestone>;
    async fn delete_milestone(&self, remote_id: &str) -> SyncResult<()>;
}
