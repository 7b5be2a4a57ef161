//! GitHub Issues REST backend. The only module in this crate that knows
//! GitHub's wire shapes — everything else sees `SyncIssue`/
//! `SyncMilestone`.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use roadmap_model::{SyncIssue, SyncMilestone};
use serde::Deserialize;

use crate::http::{classify_status, network_error, parse_next_link};
use crate::port::{IssueFilter, IssuePayload, MilestonePayload, RemoteBackendPort};
use crate::team_cache::TeamMemberCache;

const API_BASE: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;
const BACKEND_NAME: &str = "github";

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhMilestoneRef {
    number: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    labels: Vec<GhLabel>,
    #[serde(default)]
    assignees: Vec<GhUser>,
    #[serde(default)]
    milestone: Option<GhMilestoneRef>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl GhIssue {
    fn into_sync_issue(self) -> SyncIssue {
        let id = self.number.to_string();
        let mut remote_ids = HashMap::new();
        remote_ids.insert(BACKEND_NAME.to_string(), id.clone());
        SyncIssue {
            id: id.clone(),
            title: self.title,
            status: self.state,
            description: self.body.unwrap_or_default(),
            assignee: self.assignees.into_iter().next().map(|u| u.login),
            milestone: self.milestone.map(|m| m.title),
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            backend_name: BACKEND_NAME.to_string(),
            backend_id: Some(id),
            remote_ids,
            custom_fields: HashMap::new(),
            raw_response: HashMap::new(),
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhMilestone {
    number: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    state: String,
    due_on: Option<DateTime<Utc>>,
}

impl GhMilestone {
    fn into_sync_milestone(self) -> SyncMilestone {
        let id = self.number.to_string();
        let mut remote_ids = HashMap::new();
        remote_ids.insert(BACKEND_NAME.to_string(), id.clone());
        SyncMilestone {
            id: id.clone(),
            name: self.title,
            status: self.state,
            description: self.description,
            due_date: self.due_on,
            backend_name: BACKEND_NAME.to_string(),
            backend_id: Some(id),
            remote_ids,
            custom_fields: HashMap::new(),
            raw_response: HashMap::new(),
            metadata: HashMap::new(),
        }
    }
}

pub struct GitHubBackend {
    http: Client,
    owner: String,
    repo: String,
    team_cache: TeamMemberCache,
}

impl GitHubBackend {
    /// `token` is a GitHub personal access token or installation token;
    /// presence is not checked here — an empty token surfaces as a 401
    /// on the first real request, which `authenticate` treats as
    /// `authentication_failed`.
    pub fn new(token: &str, owner: impl Into<String>, repo: impl Into<String>) -> SyncResult<Self> {
        let mut headers = header::HeaderMap::new();
        let auth_value = header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| SyncError::new(SyncErrorType::ConfigurationError, format!("invalid token: {e}")))?;
        headers.insert(header::AUTHORIZATION, auth_value);
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static("roadmap-sync"));

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::new(SyncErrorType::ConfigurationError, format!("failed to build http client: {e}")))?;

        Ok(Self { http, owner: owner.into(), repo: repo.into(), team_cache: TeamMemberCache::new() })
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{API_BASE}/repos/{}/{}{}", self.owner, self.repo, path)
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, req: reqwest::RequestBuilder, operation: &str) -> SyncResult<T> {
        let response = req.send().await.map_err(|e| network_error(operation, &e))?;
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|e| network_error(operation, &e))
        } else {
            let retry_after = response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()).map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status, operation, &body, retry_after.as_deref()))
        }
    }

    /// Follows `Link: rel="next"` until a page comes back empty or
    /// without a next link. A transport error mid-pagination returns as
    /// an error, not the partial pages collected so far — callers can't
    /// tell "done" from "interrupted" otherwise.
    async fn paginate<T: serde::de::DeserializeOwned>(&self, first_url: String, operation: &str) -> SyncResult<Vec<T>> {
        let mut all = Vec::new();
        let mut next_url = Some(first_url);

        while let Some(url) = next_url {
            let response = self.http.get(&url).send().await.map_err(|e| network_error(operation, &e))?;
            let status = response.status();
            if !status.is_success() {
                let retry_after = response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()).map(str::to_string);
                let body = response.text().await.unwrap_or_default();
                return Err(classify_status(status, operation, &body, retry_after.as_deref()));
            }

            let link_header = response.headers().get(header::LINK).and_then(|v| v.to_str().ok()).map(str::to_string);
            let page: Vec<T> = response.json().await.map_err(|e| network_error(operation, &e))?;
            if page.is_empty() {
                tracing::debug!(operation, total = all.len(), "pagination complete, empty page");
                break;
            }
            all.extend(page);

            next_url = link_header.and_then(|h| parse_next_link(&h));
            if next_url.is_none() {
                tracing::debug!(operation, total = all.len(), "pagination complete, no next link");
            }
        }

        Ok(all)
    }
}

#[async_trait]
impl RemoteBackendPort for GitHubBackend {
    async fn authenticate(&self) -> SyncResult<()> {
        let response = self.http.get(format!("{API_BASE}/user")).send().await.map_err(|e| network_error("GET /user", &e))?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, "GET /user", &body, None));
        }
        Ok(())
    }

    async fn list_issues(&self, filter: Option<IssueFilter>) -> SyncResult<HashMap<String, SyncIssue>> {
        let filter = filter.unwrap_or_default();
        let mut url = reqwest::Url::parse(&self.repo_url("/issues")).expect("static base url is valid");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("per_page", &PER_PAGE.to_string());
            query.append_pair("state", filter.state.as_deref().unwrap_or("all"));
            if !filter.labels.is_empty() {
                query.append_pair("labels", &filter.labels.join(","));
            }
            if let Some(milestone) = &filter.milestone {
                query.append_pair("milestone", milestone);
            }
        }

        let issues: Vec<GhIssue> = self.paginate(url.to_string(), "GET /issues").await?;
        Ok(issues.into_iter().map(|i| (i.number.to_string(), i.into_sync_issue())).collect())
    }

    async fn get_issue(&self, remote_id: &str) -> SyncResult<SyncIssue> {
        let req = self.http.get(self.repo_url(&format!("/issues/{remote_id}")));
        let issue: GhIssue = self.send(req, "GET /issues/{id}").await?;
        Ok(issue.into_sync_issue())
    }

    async fn create_issue(&self, payload: IssuePayload) -> SyncResult<SyncIssue> {
        let body = self.build_issue_body(payload).await;
        let req = self.http.post(self.repo_url("/issues")).json(&body);
        let issue: GhIssue = self.send(req, "POST /issues").await?;
        Ok(issue.into_sync_issue())
    }

    async fn update_issue(&self, remote_id: &str, payload: IssuePayload) -> SyncResult<SyncIssue> {
        let mut body = self.build_issue_body(payload.clone()).await;
        if let Some(status) = &payload.status {
            let state = if status == "closed" { "closed" } else { "open" };
            body.insert("state".to_string(), serde_json::Value::from(state));
        }
        let req = self.http.patch(self.repo_url(&format!("/issues/{remote_id}"))).json(&body);
        let issue: GhIssue = self.send(req, "PATCH /issues/{id}").await?;
        Ok(issue.into_sync_issue())
    }

    async fn list_milestones(&self) -> SyncResult<HashMap<String, SyncMilestone>> {
        let mut url = reqwest::Url::parse(&self.repo_url("/milestones")).expect("static base url is valid");
        url.query_pairs_mut().append_pair("per_page", &PER_PAGE.to_string()).append_pair("state", "all");
        let milestones: Vec<GhMilestone> = self.paginate(url.to_string(), "GET /milestones").await?;
        Ok(milestones.into_iter().map(|m| (m.number.to_string(), m.into_sync_milestone())).collect())
    }

    async fn get_milestone(&self, remote_id: &str) -> SyncResult<SyncMilestone> {
        let req = self.http.get(self.repo_url(&format!("/milestones/{remote_id}")));
        let milestone: GhMilestone = self.send(req, "GET /milestones/{id}").await?;
        Ok(milestone.into_sync_milestone())
    }

    async fn create_milestone(&self, payload: MilestonePayload) -> SyncResult<SyncMilestone> {
        let body = build_milestone_body(&payload);
        let req = self.http.post(self.repo_url("/milestones")).json(&body);
        let milestone: GhMilestone = self.send(req, "POST /milestones").await?;
        Ok(milestone.into_sync_milestone())
    }

    async fn update_milestone(&self, remote_id: &str, payload: MilestonePayload) -> SyncResult<SyncMilestone> {
        let body = build_milestone_body(&payload);
        let req = self.http.patch(self.repo_url(&format!("/milestones/{remote_id}"))).json(&body);
        let milestone: GhMilestone = self.send(req, "PATCH /milestones/{id}").await?;
        Ok(milestone.into_sync_milestone())
    }

    async fn delete_milestone(&self, remote_id: &str) -> SyncResult<()> {
        let response = self
            .http
            .delete(self.repo_url(&format!("/milestones/{remote_id}")))
            .send()
            .await
            .map_err(|e| network_error("DELETE /milestones/{id}", &e))?;
        let status = response.status();
        if status.is_success() || status.as_u16() == 204 {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status, "DELETE /milestones/{id}", &body, None))
        }
    }
}

impl GitHubBackend {
    /// Builds the JSON body shared by create/update, dropping any
    /// assignee the team cache doesn't recognize rather than letting
    /// GitHub bounce the whole request with a 422.
    async fn build_issue_body(&self, payload: IssuePayload) -> HashMap<String, serde_json::Value> {
        let mut body = HashMap::new();
        if let Some(title) = payload.title {
            body.insert("title".to_string(), serde_json::Value::from(title));
        }
        if let Some(desc) = payload.body {
            body.insert("body".to_string(), serde_json::Value::from(desc));
        }
        if !payload.labels.is_empty() {
            body.insert("labels".to_string(), serde_json::Value::from(payload.labels));
        }
        if !payload.assignees.is_empty() {
            let mut valid = Vec::new();
            for login in &payload.assignees {
                let owner = self.owner.clone();
                let repo = self.repo.clone();
                let http = self.http.clone();
                let known = self
                    .team_cache
                    .validate_assignee(login, || async move { fetch_collaborators(&http, &owner, &repo).await })
                    .await;
                if known {
                    valid.push(login.clone());
                } else {
                    tracing::warn!(login, "dropping unknown assignee from payload");
                }
            }
            if !valid.is_empty() {
                body.insert("assignees".to_string(), serde_json::Value::from(valid));
            }
        }
        if let Some(milestone) = payload.milestone {
            if let Ok(number) = milestone.parse::<u64>() {
                body.insert("milestone".to_string(), serde_json::Value::from(number));
            } else {
                tracing::warn!(milestone, "dropping milestone unknown to the remote");
            }
        }
        body
    }
}

async fn fetch_collaborators(http: &Client, owner: &str, repo: &str) -> HashSet<String> {
    #[derive(Deserialize)]
    struct Collaborator {
        login: String,
    }
    let url = format!("{API_BASE}/repos/{owner}/{repo}/collaborators?per_page={PER_PAGE}");
    match http.get(&url).send().await {
        Ok(response) if response.status().is_success() => response
            .json::<Vec<Collaborator>>()
            .await
            .map(|cs| cs.into_iter().map(|c| c.login).collect())
            .unwrap_or_default(),
        _ => HashSet::new(),
    }
}

fn build_milestone_body(payload: &MilestonePayload) -> HashMap<String, serde_json::Value> {
    let mut body = HashMap::new();
    if let Some(name) = &payload.name {
        body.insert("title".to_string(), serde_json::Value::from(name.clone()));
    }
    if let Some(desc) = &payload.description {
        body.insert("description".to_string(), serde_json::Value::from(desc.clone()));
    }
    if let Some(due) = &payload.due_date {
        body.insert("due_on".to_string(), serde_json::Value::from(due.to_rfc3339()));
    }
    if let Some(status) = &payload.status {
        let state = if status == "closed" { "closed" } else { "open" };
        body.insert("state".to_string(), serde_json::Value::from(state));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gh_issue_maps_remote_ids_and_labels() {
        let gh = GhIssue {
            number: 42,
            title: "Fix crash".to_string(),
            body: Some("details".to_string()),
            state: "open".to_string(),
            labels: vec![GhLabel { name: "bug".to_string() }],
            assignees: vec![GhUser { login: "octocat".to_string() }],
            milestone: Some(GhMilestoneRef { number: 1, title: "v1".to_string() }),
            created_at: None,
            updated_at: None,
        };
        let issue = gh.into_sync_issue();
        assert_eq!(issue.id, "42");
        assert_eq!(issue.remote_ids.get("github"), Some(&"42".to_string()));
        assert_eq!(issue.labels, vec!["bug".to_string()]);
        assert_eq!(issue.assignee, Some("octocat".to_string()));
        assert_eq!(issue.milestone, Some("v1".to_string()));
    }

    #[test]
    fn build_milestone_body_maps_closed_status() {
        let payload = MilestonePayload { status: Some("closed".to_string()), ..Default::default() };
        let body = build_milestone_body(&payload);
        assert_eq!(body.get("state").and_then(|v| v.as_str()), Some("closed"));
    }
}
