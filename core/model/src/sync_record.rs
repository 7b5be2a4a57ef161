//! Canonical remote records — the wire-normalized common currency
//! between local state and remote state. Every Remote Backend Port
//! implementation normalizes its native API shape into these before
//! handing anything to the orchestrator; the orchestrator never sees a
//! backend-specific payload.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncIssue {
    pub id: String,
    pub title: String,
    /// Normalized: "open", "closed", "in_progress", etc. Not validated
    /// against a fixed enum here; backend-specific normalization happens
    /// at the adapter boundary.
    pub status: String,

    #[serde(default)]
    pub description: String,
    pub assignee: Option<String>,
    pub milestone: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default = "default_backend_name")]
    pub backend_name: String,
    pub backend_id: Option<String>,
    #[serde(default)]
    pub remote_ids: HashMap<String, String>,

    #[serde(default)]
    pub custom_fields: HashMap<String, Value>,
    #[serde(default)]
    pub raw_response: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

fn default_backend_name() -> String {
    "unknown".to_string()
}

impl SyncIssue {
    /// # Errors
    /// `validation_error` if `id`, `title`, or `status` is empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: impl Into<String>) -> SyncResult<Self> {
        let (id, title, status) = (id.into(), title.into(), status.into());
        if id.is_empty() {
            return Err(SyncError::new(SyncErrorType::ValidationError, "SyncIssue.id is required"));
        }
        if title.is_empty() {
            return Err(SyncError::new(SyncErrorType::ValidationError, "SyncIssue.title is required"));
        }
        if status.is_empty() {
            return Err(SyncError::new(SyncErrorType::ValidationError, "SyncIssue.status is required"));
        }
        Ok(Self {
            id,
            title,
            status,
            description: String::new(),
            assignee: None,
            milestone: None,
            labels: Vec::new(),
            created_at: None,
            updated_at: None,
            backend_name: default_backend_name(),
            backend_id: None,
            remote_ids: HashMap::new(),
            custom_fields: HashMap::new(),
            raw_response: HashMap::new(),
            metadata: HashMap::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMilestone {
    pub id: String,
    pub name: String,
    #[serde(default = "default_open_status")]
    pub status: String,

    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default = "default_backend_name")]
    pub backend_name: String,
    pub backend_id: Option<String>,
    #[serde(default)]
    pub remote_ids: HashMap<String, String>,

    #[serde(default)]
    pub custom_fields: HashMap<String, Value>,
    #[serde(default)]
    pub raw_response: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

fn default_open_status() -> String {
    "open".to_string()
}

impl SyncMilestone {
    /// # Errors
    /// `validation_error` if `id` or `name` is empty.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> SyncResult<Self> {
        let (id, name) = (id.into(), name.into());
        if id.is_empty() {
            return Err(SyncError::new(SyncErrorType::ValidationError, "SyncMilestone.id is required"));
        }
        if name.is_empty() {
            return Err(SyncError::new(SyncErrorType::ValidationError, "SyncMilestone.name is required"));
        }
        Ok(Self {
            id,
            name,
            status: default_open_status(),
            description: None,
            due_date: None,
            backend_name: default_backend_name(),
            backend_id: None,
            remote_ids: HashMap::new(),
            custom_fields: HashMap::new(),
            raw_response: HashMap::new(),
            metadata: HashMap::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProject {
    pub id: String,
    pub name: String,
    pub description: Option<String>,

    #[serde(default = "default_backend_name")]
    pub backend_name: String,
    pub backend_id: Option<String>,
    #[serde(default)]
    pub remote_ids: HashMap<String, String>,

    #[serde(default)]
    pub custom_fields: HashMap<String, Value>,
    #[serde(default)]
    pub raw_response: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl SyncProject {
    /// # Errors
    /// `validation_error` if `id` or `name` is empty.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> SyncResult<Self> {
        let (id, name) = (id.into(), name.into());
        if id.is_empty() {
            return Err(SyncError::new(SyncErrorType::ValidationError, "SyncProject.id is required"));
        }
        if name.is_empty() {
            return Err(SyncError::new(SyncErrorType::ValidationError, "SyncProject.name is required"));
        }
        Ok(Self {
            id,
            name,
            description: None,
            backend_name: default_backend_name(),
            backend_id: None,
            remote_ids: HashMap::new(),
            custom_fields: HashMap::new(),
            raw_response: HashMap::new(),
            metadata: HashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_issue_rejects_empty_fields() {
        assert!(SyncIssue::new("", "title", "open").is_err());
        assert!(SyncIssue::new("id", "", "open").is_err());
        assert!(SyncIssue::new("id", "title", "").is_err());
        assert!(SyncIssue::new("id", "title", "open").is_ok());
    }

    #[test]
    fn sync_milestone_defaults_to_open() {
        let m = SyncMilestone::new("m-1", "v1").unwrap();
        assert_eq!(m.status, "open");
    }

    #[test]
    fn sync_issue_round_trips_through_json() {
        let issue = SyncIssue::new("42", "Fix crash", "open").unwrap();
        let json = serde_json::to_string(&issue).unwrap();
        let back: SyncIssue = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, issue.id);
        assert_eq!(back.title, issue.title);
    }
}
