//! Transient types produced by the Duplicate Detector and consumed by
//! the Duplicate Resolver. Neither survives past a single sync run.

use std::collections::HashMap;

use roadmap_common::{SyncError, SyncErrorType, SyncResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    IdCollision,
    TitleExact,
    TitleSimilar,
    ContentSimilar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendedAction {
    AutoMerge,
    ManualReview,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub local_entity_id: String,
    pub remote_entity_id: String,
    pub backend_name: String,
    pub match_type: MatchType,
    /// Enforced in `[0.0, 1.0]` at construction.
    pub confidence: f64,
    pub recommended_action: RecommendedAction,
    #[serde(default)]
    pub similarity_details: HashMap<String, Value>,
}

impl DuplicateMatch {
    /// # Errors
    /// `validation_error` if `confidence` is outside `[0.0, 1.0]`.
    pub fn new(
        local_entity_id: impl Into<String>,
        remote_entity_id: impl Into<String>,
        backend_name: impl Into<String>,
        match_type: MatchType,
        confidence: f64,
        recommended_action: RecommendedAction,
    ) -> SyncResult<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(SyncError::new(
                SyncErrorType::ValidationError,
                format!("confidence {confidence} outside [0.0, 1.0]"),
            ));
        }
        Ok(Self {
            local_entity_id: local_entity_id.into(),
            remote_entity_id: remote_entity_id.into(),
            backend_name: backend_name.into(),
            match_type,
            confidence,
            recommended_action,
            similarity_details: HashMap::new(),
        })
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.similarity_details.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionTag {
    Merge,
    Delete,
    Archive,
    Link,
    Keep,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionAction {
    pub matched: DuplicateMatch,
    pub action: ActionTag,
    /// The entity chosen to survive.
    pub canonical_id: String,
    pub duplicate_id: String,
    pub confidence: f64,
    pub error: Option<String>,
}

impl ResolutionAction {
    pub fn new(matched: DuplicateMatch, action: ActionTag, canonical_id: impl Into<String>, duplicate_id: impl Into<String>) -> Self {
        let confidence = matched.confidence;
        Self {
            matched,
            action,
            canonical_id: canonical_id.into(),
            duplicate_id: duplicate_id.into(),
            confidence,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_confidence_outside_unit_interval() {
        assert!(DuplicateMatch::new("a", "b", "github", MatchType::TitleExact, 1.5, RecommendedAction::Skip).is_err());
        assert!(DuplicateMatch::new("a", "b", "github", MatchType::TitleExact, -0.1, RecommendedAction::Skip).is_err());
    }

    #[test]
    fn accepts_boundary_confidences() {
        assert!(DuplicateMatch::new("a", "b", "github", MatchType::TitleExact, 0.0, RecommendedAction::Skip).is_ok());
        assert!(DuplicateMatch::new("a", "b", "github", MatchType::TitleExact, 1.0, RecommendedAction::AutoMerge).is_ok());
    }

    #[test]
    fn resolution_action_carries_matched_confidence() {
        let m = DuplicateMatch::new("a", "b", "github", MatchType::IdCollision, 0.95, RecommendedAction::AutoMerge).unwrap();
        let resolution = ResolutionAction::new(m, ActionTag::Merge, "a", "b");
        assert_eq!(resolution.confidence, 0.95);
    }
}
