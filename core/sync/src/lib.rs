//! Sync Engine: orchestrates a one-shot sync run end to end.
//!
//! - [`orchestrator`] walks the managed directory tree and the Local
//!   Store to decide an incremental pass vs. a full rebuild from git
//!   history.
//! - [`executor`] applies the resulting push/pull/update deltas (and
//!   whatever the Duplicate Resolver decided) against a
//!   `RemoteBackendPort`, with retry and per-backend circuit breaking.
//! - [`classifier`] aggregates every `SyncError` a run surfaces into a
//!   categorized, human-readable summary.
//! - [`types`] holds the shared `SyncReport`/`SyncConflict` result
//!   shapes the other two modules produce and consume.

pub mod classifier;
pub mod executor;
pub mod orchestrator;
pub mod types;

pub use classifier::{ErrorClassifier, ErrorSummary};
pub use executor::{ExecutionInput, ExecutorConfig, SyncExecutor};
pub use orchestrator::{IncrementalStats, RebuildStats, SyncOrchestrator};
pub use types::{SyncConflict, SyncReport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_exports_are_reachable() {
        let _config = ExecutorConfig::default();
        let _executor = SyncExecutor::new(_config);
        let _classifier = ErrorClassifier::new();
        let _report = SyncReport::new();
    }
}
