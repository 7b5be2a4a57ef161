//! The local `Project` entity.

use std::collections::HashMap;

use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: ProjectStatus,
    #[serde(default)]
    pub remote_ids: HashMap<String, String>,
}

impl Project {
    /// # Errors
    /// Returns `validation_error` if `name` is empty.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> SyncResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SyncError::new(SyncErrorType::ValidationError, "Project.name is required"));
        }
        Ok(Self {
            id: id.into(),
            name,
            description: String::new(),
            status: ProjectStatus::Active,
            remote_ids: HashMap::new(),
        })
    }
}

impl crate::entity::Entity for Project {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.name
    }

    fn content(&self) -> &str {
        &self.description
    }

    fn labels(&self) -> Vec<String> {
        Vec::new()
    }

    fn remote_ids(&self) -> &HashMap<String, String> {
        &self.remote_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        let err = Project::new("p-1", "").unwrap_err();
        assert_eq!(err.category, SyncErrorType::ValidationError);
    }
}
