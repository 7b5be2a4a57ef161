//! Per-file sync bookkeeping and the local-to-remote identity mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authoritative record of "what was synced to the store, at what
/// content hash." Updated atomically with the entity write it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSyncState {
    /// Relative, POSIX-form path.
    pub path: String,
    /// 256-bit hex digest.
    pub content_hash: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl FileSyncState {
    pub fn new(path: impl Into<String>, content_hash: impl Into<String>, size: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            content_hash: content_hash.into(),
            size,
            last_modified,
        }
    }

    /// A file is considered changed whenever it is missing, never synced,
    /// or its hash no longer matches.
    pub fn has_changed(stored: Option<&FileSyncState>, current_hash: &str) -> bool {
        match stored {
            None => true,
            Some(state) => state.content_hash != current_hash,
        }
    }
}

/// Triple (local-entity-ID, backend-name, remote-id). Two global
/// uniqueness invariants are enforced by the Local Store, not here:
/// (a) each (local_entity_id, backend_name) pair is unique; (b) each
/// (backend_name, remote_id) pair is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLink {
    pub local_entity_id: String,
    pub backend_name: String,
    pub remote_id: String,
}

impl RemoteLink {
    pub fn new(local_entity_id: impl Into<String>, backend_name: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            local_entity_id: local_entity_id.into(),
            backend_name: backend_name.into(),
            remote_id: remote_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_state_counts_as_changed() {
        assert!(FileSyncState::has_changed(None, "abc"));
    }

    #[test]
    fn matching_hash_is_unchanged() {
        let state = FileSyncState::new("issues/1.md", "abc", 10, Utc::now());
        assert!(!FileSyncState::has_changed(Some(&state), "abc"));
    }

    #[test]
    fn differing_hash_is_changed() {
        let state = FileSyncState::new("issues/1.md", "abc", 10, Utc::now());
        assert!(FileSyncState::has_changed(Some(&state), "def"));
    }
}
