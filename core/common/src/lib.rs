//! Shared result/error kernel and reliability primitives used by every
//! crate in the workspace: the `SyncError` taxonomy, list combinators
//! over `Result`, and the retry/circuit-breaker executors.

pub mod error;
pub mod retry;

pub use error::{
    all_ok, any_err, collect_results, first_err, partition_results, SyncError, SyncErrorType,
    SyncResult,
};
pub use retry::{retry, retry_with_config, CircuitBreaker, CircuitState, RetryConfig, RetryExecutor};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_exports_are_reachable() {
        let err = SyncError::new(SyncErrorType::UnknownError, "test");
        assert!(err.is_recoverable());
        let _cfg = RetryConfig::default();
    }
}
