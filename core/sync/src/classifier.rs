//! Error Classifier: aggregates every `SyncError` a sync run surfaces
//! into per-category counts and a bounded sample of messages/entities,
//! for a clear end-of-run summary instead of a wall of stack traces.
//!
//! The category waterfall itself already lives in `SyncError::from_message`
//! (`roadmap_common`) — this module's job is purely aggregation and the
//! user-facing suggestion/recommendation tables, grounded on the
//! category-group summary the original adapter produced.

use std::collections::HashMap;

use roadmap_common::{SyncError, SyncErrorType};

const MAX_SAMPLES: usize = 5;

#[derive(Debug, Clone)]
pub struct ErrorSummary {
    pub category: SyncErrorType,
    pub count: usize,
    pub sample_messages: Vec<String>,
    pub affected_entities: Vec<String>,
    pub suggested_fix: String,
    pub is_recoverable: bool,
}

#[derive(Debug, Default)]
pub struct ErrorClassifier {
    errors: Vec<SyncError>,
    category_counts: HashMap<SyncErrorType, usize>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `message`/`error_type` via the shared waterfall, tags
    /// it with the affected entity, attaches a suggested fix if the
    /// error didn't already carry one, and records it for aggregation.
    pub fn classify_error(
        &mut self,
        message: impl Into<String>,
        error_type: &str,
        entity_type: impl Into<String>,
        entity_id: Option<&str>,
    ) -> SyncError {
        let mut err = SyncError::from_message(error_type, message).with_entity(entity_type, entity_id.unwrap_or("").to_string());
        if err.suggested_fix.is_none() {
            err = err.with_suggestion(suggested_fix(err.category));
        }
        self.record(err.clone());
        err
    }

    /// Records an error that was already classified at its origin (the
    /// common case: the Remote Backend Port and Local Store already
    /// produce a categorized `SyncError`).
    pub fn record(&mut self, error: SyncError) {
        *self.category_counts.entry(error.category).or_insert(0) += 1;
        self.errors.push(error);
    }

    pub fn total_errors(&self) -> usize {
        self.errors.len()
    }

    pub fn category_count(&self, category: SyncErrorType) -> usize {
        self.category_counts.get(&category).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.category_counts.clear();
    }

    /// Per-category summary, sorted by count descending (ties keep
    /// first-seen order).
    pub fn summary(&self) -> Vec<ErrorSummary> {
        let mut summaries: Vec<ErrorSummary> = self
            .category_counts
            .iter()
            .map(|(&category, &count)| {
                let category_errors: Vec<&SyncError> = self.errors.iter().filter(|e| e.category == category).collect();

                let mut seen_messages = Vec::new();
                for e in &category_errors {
                    if !seen_messages.contains(&e.message) {
                        seen_messages.push(e.message.clone());
                    }
                    if seen_messages.len() >= MAX_SAMPLES {
                        break;
                    }
                }

                let mut seen_entities = Vec::new();
                for e in &category_errors {
                    if let Some(id) = &e.entity_id {
                        if !id.is_empty() && !seen_entities.contains(id) {
                            seen_entities.push(id.clone());
                        }
                    }
                    if seen_entities.len() >= MAX_SAMPLES {
                        break;
                    }
                }

                ErrorSummary {
                    category,
                    count,
                    sample_messages: seen_messages,
                    affected_entities: seen_entities,
                    suggested_fix: category_errors.first().and_then(|e| e.suggested_fix.clone()).unwrap_or_else(|| suggested_fix(category)),
                    is_recoverable: category.is_recoverable(),
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.count.cmp(&a.count));
        summaries
    }

    /// Counts per higher-level bucket (dependency/api/auth/data/
    /// resource/file-system/config/reliability/unknown).
    pub fn summary_dict(&self) -> HashMap<String, usize> {
        let mut result = HashMap::new();
        for (group, categories) in category_groups() {
            let total: usize = categories.iter().map(|c| self.category_count(*c)).sum();
            result.insert(group.to_string(), total);
        }
        result
    }

    pub fn get_recommendation(&self, category_group: &str) -> String {
        recommendation_for(category_group)
    }

    /// Entity IDs affected by any category in `category_group`.
    pub fn get_entities_by_category(&self, category_group: &str) -> Vec<String> {
        let categories: Vec<SyncErrorType> = category_groups()
            .into_iter()
            .find(|(name, _)| *name == category_group)
            .map(|(_, cats)| cats.to_vec())
            .unwrap_or_default();

        let mut ids = Vec::new();
        for e in &self.errors {
            if categories.contains(&e.category) {
                if let Some(id) = &e.entity_id {
                    if !id.is_empty() && !ids.contains(id) {
                        ids.push(id.clone());
                    }
                }
            }
        }
        ids
    }
}

/// Groups the full 23-category taxonomy into the same high-level
/// buckets the original classifier used, extended to cover the
/// categories this workspace's taxonomy adds beyond it (conflict/merge,
/// configuration, circuit-breaker/retry-exhaustion).
fn category_groups() -> [(&'static str, &'static [SyncErrorType]); 9] {
    use SyncErrorType::*;
    [
        ("dependency_errors", &[MilestoneNotFound, ProjectNotFound]),
        ("api_errors", &[ApiRateLimit, NetworkError, Timeout, ServiceUnavailable]),
        ("auth_errors", &[AuthenticationFailed, PermissionDenied, TokenExpired]),
        ("data_errors", &[InvalidData, SchemaMismatch, DuplicateEntity, ValidationError, DatabaseError]),
        ("resource_errors", &[ResourceDeleted, ResourceNotFound]),
        ("conflict_errors", &[Conflict, MergeConflict]),
        ("config_errors", &[ConfigurationError]),
        ("reliability_errors", &[CircuitBreakerOpen, RetryExhausted]),
        ("file_system_errors", &[FileSystemError]),
    ]
}

fn suggested_fix(category: SyncErrorType) -> String {
    use SyncErrorType::*;
    match category {
        MilestoneNotFound => "Run sync again to pull missing milestones, or manually create the milestone locally",
        ProjectNotFound => "Ensure projects are synced before issues; check the remote's project configuration",
        ApiRateLimit => "Wait for the rate limit window to reset, or use authenticated requests",
        NetworkError => "Check network connectivity and the remote service's status page",
        Timeout => "Retry the operation; consider syncing in smaller batches",
        ServiceUnavailable => "The remote is experiencing issues; check its status page and retry later",
        AuthenticationFailed => "Reconfigure the access token",
        PermissionDenied => "Verify the token has the required scopes for this repository",
        TokenExpired => "Generate a new token and update the configured credential",
        InvalidData => "Check the payload shape; the remote may require fields this client doesn't send",
        SchemaMismatch => "Run the local store's integrity check and repair",
        DuplicateEntity => "Run duplicate resolution to merge or link the conflicting records",
        ValidationError => "Check the entity's required fields and dependency references",
        ResourceDeleted => "Entity was deleted on the remote; expected and safe to ignore",
        ResourceNotFound => "Entity may have been renamed or deleted on the remote",
        DatabaseError => "Run the local store's integrity check; may need to reinitialize",
        FileSystemError => "Check file permissions and available disk space",
        ConfigurationError => "Check the sync configuration for missing or invalid settings",
        Conflict | MergeConflict => "Review both versions and resolve the conflict manually",
        CircuitBreakerOpen => "The remote has failed repeatedly; wait for the cool-down to elapse",
        RetryExhausted => "The operation failed after all retries; check the underlying error",
        UnknownError => "Run with verbose logging for more detail",
    }
    .to_string()
}

fn recommendation_for(category_group: &str) -> String {
    match category_group {
        "dependency_errors" => "Ensure all dependencies (milestones, projects) are synced first. Run sync again.",
        "api_errors" => "Check the remote service's status page. Retry after a short wait.",
        "auth_errors" => "Verify the configured access token has the required scopes.",
        "data_errors" => "Check local store integrity; may need an integrity repair pass.",
        "resource_errors" => "These resources may have been deleted on the remote. Expected after cleanup.",
        "conflict_errors" => "Review flagged conflicts and resolve manually; neither side is auto-applied.",
        "config_errors" => "Check the sync configuration for missing or invalid settings.",
        "reliability_errors" => "The remote is failing consistently; wait for the cool-down and retry.",
        "file_system_errors" => "Check file permissions and disk space for the managed directory.",
        _ => "Check logs for more details",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_error_infers_category_via_waterfall() {
        let mut classifier = ErrorClassifier::new();
        let err = classifier.classify_error("milestone not found", "ValueError", "Issue", Some("i-1"));
        assert_eq!(err.category, SyncErrorType::MilestoneNotFound);
        assert_eq!(classifier.total_errors(), 1);
    }

    #[test]
    fn summary_sorts_by_count_descending() {
        let mut classifier = ErrorClassifier::new();
        classifier.classify_error("network unreachable", "IOError", "Issue", Some("i-1"));
        classifier.classify_error("network unreachable", "IOError", "Issue", Some("i-2"));
        classifier.classify_error("not found", "ValueError", "Issue", Some("i-3"));

        let summary = classifier.summary();
        assert_eq!(summary[0].category, SyncErrorType::NetworkError);
        assert_eq!(summary[0].count, 2);
    }

    #[test]
    fn summary_dict_groups_into_buckets() {
        let mut classifier = ErrorClassifier::new();
        classifier.record(SyncError::new(SyncErrorType::AuthenticationFailed, "bad token"));
        classifier.record(SyncError::network_error("down"));

        let dict = classifier.summary_dict();
        assert_eq!(dict.get("auth_errors"), Some(&1));
        assert_eq!(dict.get("api_errors"), Some(&1));
    }

    #[test]
    fn non_recoverable_categories_are_flagged() {
        let mut classifier = ErrorClassifier::new();
        classifier.record(SyncError::new(SyncErrorType::AuthenticationFailed, "bad token"));
        let summary = classifier.summary();
        assert!(!summary[0].is_recoverable);
    }

    #[test]
    fn samples_are_bounded_and_deduplicated() {
        let mut classifier = ErrorClassifier::new();
        for i in 0..10 {
            classifier.record(SyncError::network_error(format!("failure {i}")));
        }
        let summary = classifier.summary();
        assert_eq!(summary[0].sample_messages.len(), MAX_SAMPLES);
    }

    #[test]
    fn get_entities_by_category_filters_by_bucket() {
        let mut classifier = ErrorClassifier::new();
        classifier.classify_error("milestone not found", "ValueError", "Issue", Some("i-1"));
        classifier.classify_error("network down", "IOError", "Issue", Some("i-2"));

        let ids = classifier.get_entities_by_category("dependency_errors");
        assert_eq!(ids, vec!["i-1".to_string()]);
    }
}
