//! Result types a sync run produces: an unresolved conflict when both
//! sides changed since the last sync, and the aggregate report handed
//! back to the caller once a run finishes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Emitted when a linked pair changed on both sides after `last_sync`.
/// No automatic resolution is attempted — both snapshots are carried so
/// the caller can render and decide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConflict {
    pub entity_type: String,
    pub entity_id: String,
    pub local_snapshot: Value,
    pub remote_snapshot: Value,
    pub detected_at: DateTime<Utc>,
}

impl SyncConflict {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>, local_snapshot: Value, remote_snapshot: Value) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            local_snapshot,
            remote_snapshot,
            detected_at: Utc::now(),
        }
    }
}

/// The aggregate outcome of one Sync Executor run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub pushed: Vec<String>,
    pub pulled: Vec<String>,
    pub conflicts: Vec<SyncConflict>,
    pub errors: HashMap<String, String>,
    pub fatal_error: Option<String>,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, entity_id: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(entity_id.into(), message.into());
    }
}
