//! `SyncError` taxonomy and the category waterfall used to classify it.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The complete set of sync error categories.
///
/// Non-recoverable set: `AuthenticationFailed`, `TokenExpired`,
/// `PermissionDenied`, `SchemaMismatch`, `ConfigurationError`. This
/// five-item list is authoritative; see `is_recoverable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorType {
    AuthenticationFailed,
    TokenExpired,
    PermissionDenied,
    NetworkError,
    Timeout,
    ServiceUnavailable,
    ApiRateLimit,
    InvalidData,
    SchemaMismatch,
    DuplicateEntity,
    ValidationError,
    ResourceNotFound,
    ResourceDeleted,
    MilestoneNotFound,
    ProjectNotFound,
    Conflict,
    MergeConflict,
    DatabaseError,
    FileSystemError,
    ConfigurationError,
    CircuitBreakerOpen,
    RetryExhausted,
    UnknownError,
}

impl SyncErrorType {
    /// Whether an error of this category can plausibly be retried or
    /// worked around by the operator without reconfiguring the system.
    pub fn is_recoverable(self) -> bool {
        !matches!(
            self,
            SyncErrorType::AuthenticationFailed
                | SyncErrorType::TokenExpired
                | SyncErrorType::PermissionDenied
                | SyncErrorType::SchemaMismatch
                | SyncErrorType::ConfigurationError
        )
    }

    /// Whether an error of this category is worth an automatic retry.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            SyncErrorType::NetworkError
                | SyncErrorType::Timeout
                | SyncErrorType::ServiceUnavailable
                | SyncErrorType::ApiRateLimit
        )
    }
}

impl fmt::Display for SyncErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown_error".to_string());
        write!(f, "{s}")
    }
}

/// A classified, recovery-oriented error that crosses every component
/// boundary in the sync engine. No exception type ever crosses the
/// Remote Backend Port or the executor boundary unconverted.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{category}: {message}")]
pub struct SyncError {
    pub category: SyncErrorType,
    pub message: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub suggested_fix: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl SyncError {
    pub fn new(category: SyncErrorType, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            suggested_fix: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_fix = Some(suggestion.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_recoverable(&self) -> bool {
        self.category.is_recoverable()
    }

    pub fn is_transient(&self) -> bool {
        self.category.is_transient()
    }

    /// Build a `SyncError` from a lower-level error's display string and
    /// its Rust type name, inferring the category the way the waterfall
    /// in the error classifier does for exceptions raised mid-run.
    pub fn from_message(type_name: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower_msg = message.to_lowercase();
        let lower_type = type_name.to_lowercase();

        let category = infer_category(&lower_type, &lower_msg);
        Self::new(category, message)
    }

    pub fn authentication_error(message: impl Into<String>) -> Self {
        Self::new(SyncErrorType::AuthenticationFailed, message)
            .with_suggestion("Check that the configured token is present and valid")
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new(SyncErrorType::NetworkError, message)
            .with_suggestion("Check network connectivity and retry")
    }

    pub fn rate_limit_error(retry_after_secs: Option<u64>) -> Self {
        let mut err = Self::new(SyncErrorType::ApiRateLimit, "API rate limit exceeded")
            .with_suggestion("Wait for the rate limit window to reset");
        if let Some(secs) = retry_after_secs {
            err = err.with_metadata("retry_after", Value::from(secs));
        }
        err
    }

    pub fn resource_not_found_error(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self::new(SyncErrorType::ResourceNotFound, "resource not found")
            .with_entity(resource_type, resource_id)
            .with_suggestion("Verify the resource still exists on the remote")
    }

    pub fn conflict_error(entity_type: impl Into<String>, entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(SyncErrorType::Conflict, message).with_entity(entity_type, entity_id)
    }
}

/// Waterfall category inference, run in this fixed order of specificity:
/// foreign-key -> milestone-missing -> project-missing -> dependency-missing
/// -> rate-limit -> network -> timeout -> service-unavailable -> auth ->
/// permission -> token-expired -> integrity/duplicate/validation ->
/// deleted -> not-found -> file-system -> unknown.
fn infer_category(lower_type: &str, lower_msg: &str) -> SyncErrorType {
    let has = |needle: &str| lower_type.contains(needle) || lower_msg.contains(needle);

    if has("foreign key") || has("foreignkey") {
        SyncErrorType::DatabaseError
    } else if has("milestone") && (has("not found") || has("missing")) {
        SyncErrorType::MilestoneNotFound
    } else if has("project") && (has("not found") || has("missing")) {
        SyncErrorType::ProjectNotFound
    } else if has("depend") && (has("not found") || has("missing")) {
        SyncErrorType::ValidationError
    } else if has("rate limit") || has("429") {
        SyncErrorType::ApiRateLimit
    } else if has("network") || has("connection") {
        SyncErrorType::NetworkError
    } else if has("timeout") || has("timed out") {
        SyncErrorType::Timeout
    } else if has("service unavailable") || has("502") || has("503") || has("504") {
        SyncErrorType::ServiceUnavailable
    } else if has("authentication") || has("unauthorized") || has("401") {
        SyncErrorType::AuthenticationFailed
    } else if has("permission") || has("forbidden") || has("403") {
        SyncErrorType::PermissionDenied
    } else if has("token") && has("expired") {
        SyncErrorType::TokenExpired
    } else if has("duplicate") {
        SyncErrorType::DuplicateEntity
    } else if has("validation") || has("invalid") {
        SyncErrorType::ValidationError
    } else if has("gone") || has("410") || has("deleted") {
        SyncErrorType::ResourceDeleted
    } else if has("not found") || has("404") {
        SyncErrorType::ResourceNotFound
    } else if has("no such file") || has("permission denied") && has("file") || has("io error") {
        SyncErrorType::FileSystemError
    } else {
        SyncErrorType::UnknownError
    }
}

/// Convenience alias used throughout the workspace wherever a fallible
/// operation can surface a `SyncError`.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Short-circuits on the first `Err`, matching `Result<Vec<T>, E>`'s
/// native collect behavior; provided for call sites that prefer an
/// explicit free function over `.into_iter().collect()`.
pub fn collect_results<T, E>(results: impl IntoIterator<Item = std::result::Result<T, E>>) -> std::result::Result<Vec<T>, E> {
    results.into_iter().collect()
}

/// Splits an iterator of results into (successes, failures) without
/// short-circuiting.
pub fn partition_results<T, E>(
    results: impl IntoIterator<Item = std::result::Result<T, E>>,
) -> (Vec<T>, Vec<E>) {
    let mut oks = Vec::new();
    let mut errs = Vec::new();
    for r in results {
        match r {
            Ok(v) => oks.push(v),
            Err(e) => errs.push(e),
        }
    }
    (oks, errs)
}

pub fn all_ok<T, E>(results: &[std::result::Result<T, E>]) -> bool {
    results.iter().all(|r| r.is_ok())
}

pub fn any_err<T, E>(results: &[std::result::Result<T, E>]) -> bool {
    results.iter().any(|r| r.is_err())
}

pub fn first_err<T, E: Clone>(results: &[std::result::Result<T, E>]) -> Option<E> {
    results.iter().find_map(|r| r.as_ref().err().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_recoverable_set_matches_spec() {
        assert!(!SyncErrorType::AuthenticationFailed.is_recoverable());
        assert!(!SyncErrorType::TokenExpired.is_recoverable());
        assert!(!SyncErrorType::PermissionDenied.is_recoverable());
        assert!(!SyncErrorType::SchemaMismatch.is_recoverable());
        assert!(!SyncErrorType::ConfigurationError.is_recoverable());
        assert!(SyncErrorType::NetworkError.is_recoverable());
        assert!(SyncErrorType::UnknownError.is_recoverable());
    }

    #[test]
    fn transient_set_drives_retry_eligibility() {
        assert!(SyncErrorType::NetworkError.is_transient());
        assert!(SyncErrorType::ApiRateLimit.is_transient());
        assert!(!SyncErrorType::AuthenticationFailed.is_transient());
    }

    #[test]
    fn infer_category_prefers_foreign_key_over_generic_database() {
        let err = SyncError::from_message("IntegrityError", "FOREIGN KEY constraint failed");
        assert_eq!(err.category, SyncErrorType::DatabaseError);
    }

    #[test]
    fn infer_category_milestone_before_project() {
        let err = SyncError::from_message("ValueError", "milestone not found: v2");
        assert_eq!(err.category, SyncErrorType::MilestoneNotFound);
    }

    #[test]
    fn infer_category_rate_limit_before_network() {
        let err = SyncError::from_message("HttpError", "rate limit exceeded, connection will retry");
        assert_eq!(err.category, SyncErrorType::ApiRateLimit);
    }

    #[test]
    fn collect_results_short_circuits() {
        let results: Vec<std::result::Result<i32, &str>> = vec![Ok(1), Err("boom"), Ok(3)];
        assert_eq!(collect_results(results), Err("boom"));
    }

    #[test]
    fn partition_results_splits_without_short_circuit() {
        let results: Vec<std::result::Result<i32, &str>> = vec![Ok(1), Err("boom"), Ok(3)];
        let (oks, errs) = partition_results(results);
        assert_eq!(oks, vec![1, 3]);
        assert_eq!(errs, vec!["boom"]);
    }

    #[test]
    fn rate_limit_error_carries_retry_after() {
        let err = SyncError::rate_limit_error(Some(30));
        assert_eq!(err.metadata.get("retry_after"), Some(&Value::from(30)));
    }
}
