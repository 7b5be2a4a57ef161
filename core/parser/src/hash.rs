//! Content hashing and metadata extraction.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

/// SHA-256 hex digest of a file's raw bytes. A missing or unreadable
/// file yields an empty string — the sentinel downstream callers treat
/// as "definitely changed."
pub fn calculate_file_hash(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            format!("{:x}", hasher.finalize())
        }
        Err(err) => {
            warn!(file = %path.display(), error = %err, "failed to calculate file hash");
            String::new()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub hash: String,
    pub size: u64,
    pub modified_time: DateTime<Utc>,
}

/// Extracts `{hash, size, modified_time}` without parsing the file's
/// frontmatter. Returns `None` if the file's metadata cannot be read at
/// all (the error is logged, never raised).
pub fn extract_file_metadata(path: &Path) -> Option<FileMetadata> {
    let stat = match std::fs::metadata(path) {
        Ok(stat) => stat,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "failed to extract file metadata");
            return None;
        }
    };

    let modified_time: DateTime<Utc> = stat
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Some(FileMetadata {
        hash: calculate_file_hash(path),
        size: stat.len(),
        modified_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_hashes_to_empty_string() {
        let hash = calculate_file_hash(Path::new("/nonexistent/does-not-exist.md"));
        assert_eq!(hash, "");
    }

    #[test]
    fn hash_is_stable_for_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, b"hello world").unwrap();
        let h1 = calculate_file_hash(&path);
        let h2 = calculate_file_hash(&path);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn hash_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"v1").unwrap();
        let h1 = calculate_file_hash(&path);
        std::fs::write(&path, b"v2").unwrap();
        let h2 = calculate_file_hash(&path);
        assert_ne!(h1, h2);
    }

    #[test]
    fn metadata_extraction_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, b"12345").unwrap();
        let meta = extract_file_metadata(&path).unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(meta.hash.len(), 64);
    }

    #[test]
    fn metadata_extraction_of_missing_file_is_none() {
        assert!(extract_file_metadata(Path::new("/nonexistent/nope.md")).is_none());
    }
}
