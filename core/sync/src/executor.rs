//! Sync Executor (§4.8): applies resolved duplicate actions and the
//! remaining push/pull/update deltas against the Local Store and a
//! `RemoteBackendPort`. Milestones are executed before issues so that by
//! the time an issue references one, the milestone is already linked and
//! resolvable. Every outbound remote call is routed through a per-backend
//! circuit breaker wrapping a full retry-with-backoff attempt; creation
//! is made idempotent by checking for an existing link before POSTing.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use roadmap_common::{CircuitBreaker, RetryConfig, RetryExecutor, SyncResult};
use roadmap_model::{
    ActionTag, Issue, IssueStatus, Milestone, MilestoneStatus, RemoteLink, ResolutionAction, SyncIssue, SyncMilestone,
};
use roadmap_remote::{IssuePayload, MilestonePayload, RemoteBackendPort};
use roadmap_store::Store;

use crate::classifier::ErrorClassifier;
use crate::types::{SyncConflict, SyncReport};

const LAST_SYNC_KEY: &str = "last_sync";

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub retry: RetryConfig,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_reset: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit_breaker_threshold: 5,
            circuit_breaker_reset: Duration::from_secs(60),
        }
    }
}

/// Everything one executor run needs: the two already-listed entity
/// sets (so no redundant remote listing happens mid-run) plus whatever
/// the Duplicate Resolver decided for this backend.
pub struct ExecutionInput {
    pub backend_name: String,
    pub local_issues: Vec<Issue>,
    pub remote_issues: HashMap<String, SyncIssue>,
    pub local_milestones: Vec<Milestone>,
    pub remote_milestones: HashMap<String, SyncMilestone>,
    pub resolutions: Vec<ResolutionAction>,
}

/// One circuit breaker per backend name, so a failing GitHub integration
/// doesn't trip a breaker shared with some other configured backend.
pub struct SyncExecutor {
    config: ExecutorConfig,
    breakers: HashMap<String, CircuitBreaker>,
}

impl SyncExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config, breakers: HashMap::new() }
    }

    fn breaker_for(&mut self, backend_name: &str) -> &mut CircuitBreaker {
        let threshold = self.config.circuit_breaker_threshold;
        let reset = self.config.circuit_breaker_reset;
        self.breakers.entry(backend_name.to_string()).or_insert_with(|| CircuitBreaker::new(threshold, reset))
    }

    /// Routes one logical remote call through the backend's circuit
    /// breaker, which itself wraps a full retry-with-backoff attempt:
    /// the breaker's consecutive-failure counter advances once per call
    /// site, not once per retry, since exhausting retries on a single
    /// transient blip shouldn't by itself look like repeated failure.
    async fn call_remote<F, Fut, T>(&mut self, backend_name: &str, operation: F) -> SyncResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let retry_config = self.config.retry.clone();
        let breaker = self.breaker_for(backend_name);
        breaker.call(move || async move { RetryExecutor::new(retry_config).execute(operation).await }).await
    }

    /// Runs the full executor pass: milestones, then the resolver's
    /// duplicate actions, then issues. Returns the aggregate report; every
    /// per-entity failure is folded into `report.errors` and handed to
    /// `classifier`, never propagated.
    pub async fn run(
        &mut self,
        store: &mut Store,
        backend: &dyn RemoteBackendPort,
        classifier: &mut ErrorClassifier,
        input: ExecutionInput,
    ) -> SyncReport {
        let mut report = SyncReport::new();
        let backend_name = input.backend_name.as_str();

        self.push_milestones(store, backend, classifier, backend_name, &input.local_milestones, &mut report).await;
        self.pull_milestones(store, backend_name, &input.remote_milestones, classifier, &mut report);

        self.apply_resolutions(store, classifier, backend_name, input.resolutions, &mut report);

        self.push_issues(store, backend, classifier, backend_name, &input.local_issues, &mut report).await;
        // Re-read so update-push/update-pull see the links just created above.
        let issues_after_push = match store.list_issues(None) {
            Ok(issues) => issues,
            Err(err) => {
                report.fatal_error = Some(err.message.clone());
                classifier.record(err);
                return report;
            }
        };
        self.pull_issues(store, backend_name, &input.remote_issues, classifier, &mut report);
        self.reconcile_linked_issues(store, backend, classifier, backend_name, &issues_after_push, &input.remote_issues, &mut report).await;

        report
    }

    // -- Milestones -----------------------------------------------------

    async fn push_milestones(
        &mut self,
        store: &mut Store,
        backend: &dyn RemoteBackendPort,
        classifier: &mut ErrorClassifier,
        backend_name: &str,
        local_milestones: &[Milestone],
        report: &mut SyncReport,
    ) {
        for milestone in local_milestones {
            match store.get_remote_link(&milestone.id, backend_name) {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(err) => {
                    report.record_error(&milestone.id, err.message.clone());
                    classifier.record(err);
                    continue;
                }
            }

            let payload = milestone_payload(milestone);
            let result = self.call_remote(backend_name, move || backend_create_milestone(backend, payload.clone())).await;
            match result {
                Ok(created) => {
                    let remote_id = created.backend_id.clone().unwrap_or_else(|| created.id.clone());
                    let link = RemoteLink::new(milestone.id.clone(), backend_name, remote_id);
                    if let Err(err) = store.upsert_remote_link(&link) {
                        report.record_error(&milestone.id, err.message.clone());
                        classifier.record(err);
                    } else {
                        report.pushed.push(milestone.id.clone());
                    }
                }
                Err(err) => {
                    report.record_error(&milestone.id, err.message.clone());
                    classifier.record(err);
                }
            }
        }
    }

    fn pull_milestones(
        &mut self,
        store: &mut Store,
        backend_name: &str,
        remote_milestones: &HashMap<String, SyncMilestone>,
        classifier: &mut ErrorClassifier,
        report: &mut SyncReport,
    ) {
        for (remote_id, remote) in remote_milestones {
            match store.get_remote_link_by_remote_id(backend_name, remote_id) {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(err) => {
                    report.record_error(remote_id, err.message.clone());
                    classifier.record(err);
                    continue;
                }
            }

            let local_id = format!("{backend_name}-milestone-{remote_id}");
            let milestone = match milestone_from_sync(remote, local_id.clone()) {
                Ok(m) => m,
                Err(err) => {
                    report.record_error(remote_id, err.message.clone());
                    classifier.record(err);
                    continue;
                }
            };

            if let Err(err) = store.create_milestone(&milestone) {
                report.record_error(remote_id, err.message.clone());
                classifier.record(err);
                continue;
            }
            let link = RemoteLink::new(local_id.clone(), backend_name, remote_id.clone());
            if let Err(err) = store.upsert_remote_link(&link) {
                report.record_error(remote_id, err.message.clone());
                classifier.record(err);
                continue;
            }
            report.pulled.push(local_id);
        }
    }

    // -- Duplicate resolution actions ------------------------------------

    /// Applies whatever the Duplicate Resolver decided. `link` pairs an
    /// already-materialized local/remote pair; `merge` was already
    /// performed at resolution time (the interactive path's merge calls
    /// into the Issue service directly) so there's nothing left to apply
    /// here beyond recording it happened; `archive`/`delete` act on the
    /// duplicate side; `keep`/`skip` intentionally touch nothing.
    fn apply_resolutions(
        &mut self,
        store: &mut Store,
        classifier: &mut ErrorClassifier,
        backend_name: &str,
        resolutions: Vec<ResolutionAction>,
        report: &mut SyncReport,
    ) {
        for action in resolutions {
            match action.action {
                ActionTag::Link => {
                    let link = RemoteLink::new(action.matched.local_entity_id.clone(), backend_name, action.matched.remote_entity_id.clone());
                    if let Err(err) = store.upsert_remote_link(&link) {
                        report.record_error(&action.matched.local_entity_id, err.message.clone());
                        classifier.record(err);
                    }
                }
                ActionTag::Archive => match store.get_issue(&action.duplicate_id) {
                    Ok(Some(mut issue)) => {
                        issue.status = IssueStatus::Archived;
                        issue.touch();
                        if let Err(err) = store.update_issue(&issue) {
                            report.record_error(&action.duplicate_id, err.message.clone());
                            classifier.record(err);
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        report.record_error(&action.duplicate_id, err.message.clone());
                        classifier.record(err);
                    }
                },
                ActionTag::Delete => {
                    if let Err(err) = store.delete_issue(&action.duplicate_id) {
                        report.record_error(&action.duplicate_id, err.message.clone());
                        classifier.record(err);
                    }
                }
                ActionTag::Merge | ActionTag::Keep | ActionTag::Skip => {
                    if let Some(error) = &action.error {
                        report.record_error(&action.duplicate_id, error.clone());
                    }
                }
            }
        }
    }

    // -- Issues -----------------------------------------------------------

    async fn push_issues(
        &mut self,
        store: &mut Store,
        backend: &dyn RemoteBackendPort,
        classifier: &mut ErrorClassifier,
        backend_name: &str,
        local_issues: &[Issue],
        report: &mut SyncReport,
    ) {
        for issue in local_issues {
            match store.get_remote_link(&issue.id, backend_name) {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(err) => {
                    report.record_error(&issue.id, err.message.clone());
                    classifier.record(err);
                    continue;
                }
            }

            let resolved_milestone = match resolve_milestone_remote_id(store, backend_name, issue.milestone.as_deref()) {
                Ok(id) => id,
                Err(err) => {
                    report.record_error(&issue.id, err.message.clone());
                    classifier.record(err);
                    continue;
                }
            };
            let payload = issue_payload(issue, resolved_milestone);
            let result = self.call_remote(backend_name, move || backend_create_issue(backend, payload.clone())).await;
            match result {
                Ok(created) => {
                    let remote_id = created.backend_id.clone().unwrap_or_else(|| created.id.clone());
                    let mut touched = issue.clone();
                    touched.touch();
                    touched.remote_ids.insert(backend_name.to_string(), remote_id.clone());
                    stamp_last_sync(&mut touched);
                    let link = RemoteLink::new(issue.id.clone(), backend_name, remote_id);

                    let result = store.transaction(|txn| {
                        roadmap_store::issues::update(txn, &touched)?;
                        roadmap_store::links::upsert(txn, &link)?;
                        Ok(())
                    });
                    match result {
                        Ok(()) => report.pushed.push(issue.id.clone()),
                        Err(err) => {
                            report.record_error(&issue.id, err.message.clone());
                            classifier.record(err);
                        }
                    }
                }
                Err(err) => {
                    report.record_error(&issue.id, err.message.clone());
                    classifier.record(err);
                }
            }
        }
    }

    /// Synchronous (no remote call): every remote issue not yet linked to
    /// a local record is adopted as a new local issue with a
    /// deterministically-derived ID.
    fn pull_issues(
        &mut self,
        store: &mut Store,
        backend_name: &str,
        remote_issues: &HashMap<String, SyncIssue>,
        classifier: &mut ErrorClassifier,
        report: &mut SyncReport,
    ) {
        for (remote_id, remote) in remote_issues {
            match store.get_remote_link_by_remote_id(backend_name, remote_id) {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(err) => {
                    report.record_error(remote_id, err.message.clone());
                    classifier.record(err);
                    continue;
                }
            }

            let local_id = format!("{backend_name}-{remote_id}");
            let mut issue = match issue_from_sync(remote, local_id.clone()) {
                Ok(issue) => issue,
                Err(err) => {
                    report.record_error(remote_id, err.message.clone());
                    classifier.record(err);
                    continue;
                }
            };
            stamp_last_sync(&mut issue);

            if let Err(err) = store.create_issue(&issue) {
                report.record_error(remote_id, err.message.clone());
                classifier.record(err);
                continue;
            }
            let link = RemoteLink::new(local_id.clone(), backend_name, remote_id.clone());
            if let Err(err) = store.upsert_remote_link(&link) {
                report.record_error(remote_id, err.message.clone());
                classifier.record(err);
                continue;
            }
            report.pulled.push(local_id);
        }
    }

    /// For every already-linked pair, decides between update-push,
    /// update-pull, and conflict recording based on which side (if any)
    /// changed after the pair's recorded `last_sync`.
    async fn reconcile_linked_issues(
        &mut self,
        store: &mut Store,
        backend: &dyn RemoteBackendPort,
        classifier: &mut ErrorClassifier,
        backend_name: &str,
        local_issues: &[Issue],
        remote_issues: &HashMap<String, SyncIssue>,
        report: &mut SyncReport,
    ) {
        for issue in local_issues {
            let Some(remote_id) = issue.remote_ids.get(backend_name) else { continue };
            let Some(remote) = remote_issues.get(remote_id) else { continue };

            let last_sync = last_sync_of(issue);
            let local_changed = last_sync.map(|ts| issue.updated_at > ts).unwrap_or(true);
            let remote_changed = match (remote.updated_at, last_sync) {
                (Some(updated), Some(ts)) => updated > ts,
                (Some(_), None) => true,
                (None, _) => false,
            };

            match (local_changed, remote_changed) {
                (true, true) => {
                    let local_snapshot = serde_json::to_value(issue).unwrap_or(Value::Null);
                    let remote_snapshot = serde_json::to_value(remote).unwrap_or(Value::Null);
                    report.conflicts.push(SyncConflict::new("issue", issue.id.clone(), local_snapshot, remote_snapshot));
                }
                (true, false) => {
                    let resolved_milestone = match resolve_milestone_remote_id(store, backend_name, issue.milestone.as_deref()) {
                        Ok(id) => id,
                        Err(err) => {
                            report.record_error(&issue.id, err.message.clone());
                            classifier.record(err);
                            continue;
                        }
                    };
                    let payload = issue_payload(issue, resolved_milestone);
                    let remote_id = remote_id.clone();
                    let result = self.call_remote(backend_name, move || backend_update_issue(backend, remote_id.clone(), payload.clone())).await;
                    match result {
                        Ok(_) => {
                            let mut updated = issue.clone();
                            stamp_last_sync(&mut updated);
                            if let Err(err) = store.update_issue(&updated) {
                                report.record_error(&issue.id, err.message.clone());
                                classifier.record(err);
                            } else {
                                report.pushed.push(issue.id.clone());
                            }
                        }
                        Err(err) => {
                            report.record_error(&issue.id, err.message.clone());
                            classifier.record(err);
                        }
                    }
                }
                (false, true) => {
                    let mut updated = match issue_from_sync(remote, issue.id.clone()) {
                        Ok(updated) => updated,
                        Err(err) => {
                            report.record_error(&issue.id, err.message.clone());
                            classifier.record(err);
                            continue;
                        }
                    };
                    updated.created_at = issue.created_at;
                    stamp_last_sync(&mut updated);
                    if let Err(err) = store.update_issue(&updated) {
                        report.record_error(&issue.id, err.message.clone());
                        classifier.record(err);
                    } else {
                        report.pulled.push(issue.id.clone());
                    }
                }
                (false, false) => {}
            }
        }
    }
}

fn stamp_last_sync(issue: &mut Issue) {
    issue.sync_metadata.insert(LAST_SYNC_KEY.to_string(), Value::String(Utc::now().to_rfc3339()));
}

fn last_sync_of(issue: &Issue) -> Option<DateTime<Utc>> {
    issue.sync_metadata.get(LAST_SYNC_KEY)?.as_str()?.parse().ok()
}

/// Local `closed` maps to remote `closed`; everything else maps to
/// remote `open`, per §4.5/§4.8's status mapping rule. `resolved_milestone`
/// is the backend's own milestone id, already resolved by
/// `resolve_milestone_remote_id` from the issue's local milestone
/// reference — the payload never carries a bare local id/name.
fn issue_payload(issue: &Issue, resolved_milestone: Option<String>) -> IssuePayload {
    IssuePayload {
        title: Some(issue.title.clone()),
        body: Some(issue.content.clone()),
        labels: issue.labels.iter().cloned().collect(),
        assignees: issue.assignee.iter().cloned().collect(),
        milestone: resolved_milestone,
        status: Some(if issue.status == IssueStatus::Closed { "closed".to_string() } else { "open".to_string() }),
    }
}

/// Resolves an issue's `milestone` field — a local milestone id *or*
/// name (§3) — to the backend's own milestone id, via the
/// `remote_links` row `push_milestones` creates when it pushes that
/// milestone. Looks up by id first (the common case once a milestone
/// has been synced), falling back to a name lookup for milestones
/// referenced by name. Returns `None`, never an error, when the
/// milestone has no remote counterpart yet — the caller drops it from
/// the payload rather than failing the whole issue.
fn resolve_milestone_remote_id(store: &Store, backend_name: &str, milestone_ref: Option<&str>) -> SyncResult<Option<String>> {
    let Some(milestone_ref) = milestone_ref else { return Ok(None) };

    if let Some(link) = store.get_remote_link(milestone_ref, backend_name)? {
        return Ok(Some(link.remote_id));
    }
    if let Some(milestone) = store.get_milestone_by_name(milestone_ref)? {
        if let Some(link) = store.get_remote_link(&milestone.id, backend_name)? {
            return Ok(Some(link.remote_id));
        }
    }
    Ok(None)
}

fn issue_from_sync(remote: &SyncIssue, local_id: impl Into<String>) -> SyncResult<Issue> {
    let status = if remote.status.eq_ignore_ascii_case("closed") { IssueStatus::Closed } else { IssueStatus::Todo };
    let mut issue = Issue::new(local_id, remote.title.clone(), status)?;
    issue.content = remote.description.clone();
    issue.assignee = remote.assignee.clone();
    issue.milestone = remote.milestone.clone();
    issue.labels = remote.labels.iter().cloned().collect();
    issue.remote_ids.insert(remote.backend_name.clone(), remote.backend_id.clone().unwrap_or_else(|| remote.id.clone()));
    if let Some(created_at) = remote.created_at {
        issue.created_at = created_at;
    }
    if let Some(updated_at) = remote.updated_at {
        issue.updated_at = updated_at;
    }
    Ok(issue)
}

fn milestone_payload(milestone: &Milestone) -> MilestonePayload {
    MilestonePayload {
        name: Some(milestone.name.clone()),
        description: if milestone.headline.is_empty() { None } else { Some(milestone.headline.clone()) },
        due_date: milestone.due_date,
        status: Some(if milestone.status == MilestoneStatus::Closed { "closed".to_string() } else { "open".to_string() }),
    }
}

fn milestone_from_sync(remote: &SyncMilestone, local_id: impl Into<String>) -> SyncResult<Milestone> {
    let mut milestone = Milestone::new(local_id, remote.name.clone())?;
    milestone.headline = remote.description.clone().unwrap_or_default();
    milestone.due_date = remote.due_date;
    milestone.status = if remote.status.eq_ignore_ascii_case("closed") { MilestoneStatus::Closed } else { MilestoneStatus::Open };
    milestone.remote_ids.insert(remote.backend_name.clone(), remote.backend_id.clone().unwrap_or_else(|| remote.id.clone()));
    Ok(milestone)
}

async fn backend_create_issue(backend: &dyn RemoteBackendPort, payload: IssuePayload) -> SyncResult<SyncIssue> {
    backend.create_issue(payload).await
}

async fn backend_update_issue(backend: &dyn RemoteBackendPort, remote_id: String, payload: IssuePayload) -> SyncResult<SyncIssue> {
    backend.update_issue(&remote_id, payload).await
}

async fn backend_create_milestone(backend: &dyn RemoteBackendPort, payload: MilestonePayload) -> SyncResult<SyncMilestone> {
    backend.create_milestone(payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use roadmap_model::{DuplicateMatch, MatchType, RecommendedAction};
    use roadmap_remote::IssueFilter;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        next_id: Mutex<u64>,
        fail_creates: Mutex<usize>,
        last_milestone_payload: Mutex<Option<Option<String>>>,
    }

    #[async_trait]
    impl RemoteBackendPort for FakeBackend {
        async fn authenticate(&self) -> SyncResult<()> {
            Ok(())
        }

        async fn list_issues(&self, _filter: Option<IssueFilter>) -> SyncResult<HashMap<String, SyncIssue>> {
            Ok(HashMap::new())
        }

        async fn get_issue(&self, remote_id: &str) -> SyncResult<SyncIssue> {
            SyncIssue::new(remote_id, "placeholder", "open")
        }

        async fn create_issue(&self, payload: IssuePayload) -> SyncResult<SyncIssue> {
            let mut remaining = self.fail_creates.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(roadmap_common::SyncError::network_error("connection reset"));
            }
            *self.last_milestone_payload.lock().unwrap() = Some(payload.milestone.clone());
            let mut id = self.next_id.lock().unwrap();
            *id += 1;
            let mut issue = SyncIssue::new(id.to_string(), payload.title.unwrap_or_default(), "open")?;
            issue.backend_name = "github".to_string();
            issue.backend_id = Some(issue.id.clone());
            Ok(issue)
        }

        async fn update_issue(&self, remote_id: &str, payload: IssuePayload) -> SyncResult<SyncIssue> {
            let mut issue = SyncIssue::new(remote_id, payload.title.unwrap_or_default(), payload.status.unwrap_or_else(|| "open".to_string()))?;
            issue.backend_name = "github".to_string();
            issue.backend_id = Some(remote_id.to_string());
            Ok(issue)
        }

        async fn list_milestones(&self) -> SyncResult<HashMap<String, SyncMilestone>> {
            Ok(HashMap::new())
        }

        async fn get_milestone(&self, remote_id: &str) -> SyncResult<SyncMilestone> {
            SyncMilestone::new(remote_id, "placeholder")
        }

        async fn create_milestone(&self, payload: MilestonePayload) -> SyncResult<SyncMilestone> {
            let mut id = self.next_id.lock().unwrap();
            *id += 1;
            let mut milestone = SyncMilestone::new(id.to_string(), payload.name.unwrap_or_default())?;
            milestone.backend_name = "github".to_string();
            milestone.backend_id = Some(milestone.id.clone());
            Ok(milestone)
        }

        async fn update_milestone(&self, remote_id: &str, payload: MilestonePayload) -> SyncResult<SyncMilestone> {
            SyncMilestone::new(remote_id, payload.name.unwrap_or_default())
        }

        async fn delete_milestone(&self, _remote_id: &str) -> SyncResult<()> {
            Ok(())
        }
    }

    fn empty_input(backend_name: &str) -> ExecutionInput {
        ExecutionInput {
            backend_name: backend_name.to_string(),
            local_issues: Vec::new(),
            remote_issues: HashMap::new(),
            local_milestones: Vec::new(),
            remote_milestones: HashMap::new(),
            resolutions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn pushes_unlinked_local_issue_and_records_link() {
        let mut store = Store::in_memory().unwrap();
        let issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        store.create_issue(&issue).unwrap();

        let backend = FakeBackend::default();
        let mut executor = SyncExecutor::new(ExecutorConfig::default());
        let mut classifier = ErrorClassifier::new();

        let mut input = empty_input("github");
        input.local_issues = vec![issue.clone()];
        let report = executor.run(&mut store, &backend, &mut classifier, input).await;

        assert_eq!(report.pushed, vec!["i-1".to_string()]);
        assert!(store.get_remote_link("i-1", "github").unwrap().is_some());
    }

    #[tokio::test]
    async fn pushing_an_issue_resolves_its_local_milestone_reference_to_the_remote_id() {
        let mut store = Store::in_memory().unwrap();
        let milestone = Milestone::new("m-1", "v1").unwrap();
        store.create_milestone(&milestone).unwrap();
        store.upsert_remote_link(&RemoteLink::new("m-1", "github", "7")).unwrap();

        let mut issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        issue.milestone = Some("m-1".to_string());
        store.create_issue(&issue).unwrap();

        let backend = FakeBackend::default();
        let mut executor = SyncExecutor::new(ExecutorConfig::default());
        let mut classifier = ErrorClassifier::new();

        let mut input = empty_input("github");
        input.local_issues = vec![issue];
        executor.run(&mut store, &backend, &mut classifier, input).await;

        assert_eq!(*backend.last_milestone_payload.lock().unwrap(), Some(Some("7".to_string())));
    }

    #[tokio::test]
    async fn pushing_an_issue_resolves_a_milestone_referenced_by_name() {
        let mut store = Store::in_memory().unwrap();
        let milestone = Milestone::new("m-1", "v1").unwrap();
        store.create_milestone(&milestone).unwrap();
        store.upsert_remote_link(&RemoteLink::new("m-1", "github", "7")).unwrap();

        let mut issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        issue.milestone = Some("v1".to_string());
        store.create_issue(&issue).unwrap();

        let backend = FakeBackend::default();
        let mut executor = SyncExecutor::new(ExecutorConfig::default());
        let mut classifier = ErrorClassifier::new();

        let mut input = empty_input("github");
        input.local_issues = vec![issue];
        executor.run(&mut store, &backend, &mut classifier, input).await;

        assert_eq!(*backend.last_milestone_payload.lock().unwrap(), Some(Some("7".to_string())));
    }

    #[tokio::test]
    async fn does_not_repush_an_already_linked_issue() {
        let mut store = Store::in_memory().unwrap();
        let issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        store.create_issue(&issue).unwrap();
        store.upsert_remote_link(&RemoteLink::new("i-1", "github", "99")).unwrap();

        let backend = FakeBackend::default();
        let mut executor = SyncExecutor::new(ExecutorConfig::default());
        let mut classifier = ErrorClassifier::new();

        let mut input = empty_input("github");
        input.local_issues = vec![issue];
        let report = executor.run(&mut store, &backend, &mut classifier, input).await;

        assert!(report.pushed.is_empty());
    }

    #[tokio::test]
    async fn pulls_unlinked_remote_issue_into_a_new_local_record() {
        let mut store = Store::in_memory().unwrap();
        let remote = SyncIssue::new("42", "Remote-only issue", "open").unwrap();
        let mut remote_issues = HashMap::new();
        remote_issues.insert("42".to_string(), remote);

        let backend = FakeBackend::default();
        let mut executor = SyncExecutor::new(ExecutorConfig::default());
        let mut classifier = ErrorClassifier::new();

        let mut input = empty_input("github");
        input.remote_issues = remote_issues;
        let report = executor.run(&mut store, &backend, &mut classifier, input).await;

        assert_eq!(report.pulled, vec!["github-42".to_string()]);
        assert!(store.get_issue("github-42").unwrap().is_some());
    }

    #[tokio::test]
    async fn push_failure_is_classified_and_recorded_not_propagated() {
        let mut store = Store::in_memory().unwrap();
        let issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        store.create_issue(&issue).unwrap();

        let backend = FakeBackend { fail_creates: Mutex::new(10), ..Default::default() };
        let config = ExecutorConfig { retry: RetryConfig::new(1).with_initial_delay(Duration::from_millis(1)), ..ExecutorConfig::default() };
        let mut executor = SyncExecutor::new(config);
        let mut classifier = ErrorClassifier::new();

        let mut input = empty_input("github");
        input.local_issues = vec![issue];
        let report = executor.run(&mut store, &backend, &mut classifier, input).await;

        assert!(report.pushed.is_empty());
        assert!(report.errors.contains_key("i-1"));
        assert_eq!(classifier.total_errors(), 1);
    }

    #[tokio::test]
    async fn link_resolution_action_writes_remote_link_without_pushing() {
        let mut store = Store::in_memory().unwrap();
        let issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        store.create_issue(&issue).unwrap();

        let backend = FakeBackend::default();
        let mut executor = SyncExecutor::new(ExecutorConfig::default());
        let mut classifier = ErrorClassifier::new();

        let matched = DuplicateMatch::new("i-1", "99", "github", MatchType::TitleExact, 0.98, RecommendedAction::AutoMerge).unwrap();
        let resolution = ResolutionAction::new(matched, ActionTag::Link, "i-1", "99");

        let mut input = empty_input("github");
        input.local_issues = vec![issue];
        input.resolutions = vec![resolution];
        let report = executor.run(&mut store, &backend, &mut classifier, input).await;

        assert!(store.get_remote_link("i-1", "github").unwrap().is_some());
        // Already linked, so the push stage must not also try to create it.
        assert!(report.pushed.is_empty());
    }

    #[tokio::test]
    async fn conflict_is_recorded_when_both_sides_changed_since_last_sync() {
        let mut store = Store::in_memory().unwrap();
        let mut issue = Issue::new("i-1", "Fix the thing", IssueStatus::Todo).unwrap();
        issue.remote_ids.insert("github".to_string(), "42".to_string());
        issue.sync_metadata.insert(LAST_SYNC_KEY.to_string(), Value::String((Utc::now() - chrono::Duration::days(1)).to_rfc3339()));
        store.create_issue(&issue).unwrap();
        store.upsert_remote_link(&RemoteLink::new("i-1", "github", "42")).unwrap();

        let mut remote = SyncIssue::new("42", "Fix the thing remotely", "open").unwrap();
        remote.backend_name = "github".to_string();
        remote.backend_id = Some("42".to_string());
        remote.updated_at = Some(Utc::now());
        let mut remote_issues = HashMap::new();
        remote_issues.insert("42".to_string(), remote);

        let backend = FakeBackend::default();
        let mut executor = SyncExecutor::new(ExecutorConfig::default());
        let mut classifier = ErrorClassifier::new();

        let mut input = empty_input("github");
        input.local_issues = vec![issue];
        input.remote_issues = remote_issues;
        let report = executor.run(&mut store, &backend, &mut classifier, input).await;

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].entity_id, "i-1");
    }
}
