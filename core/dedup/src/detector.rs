//! Duplicate detection between local issues and remote issues pulled
//! from a backend. `detect_all` expects both sides to already have
//! passed through `local_self_dedup`/`remote_self_dedup` — without that
//! preprocessing, title matching degrades from O(n²) canonical
//! comparisons to a spurious-match explosion on the raw input size.

use std::collections::HashMap;

use roadmap_model::{DuplicateMatch, Issue, MatchType, RecommendedAction, SyncIssue};

use crate::similarity::text_similarity;
use crate::union_find::UnionFind;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub title_similarity_threshold: f64,
    pub content_similarity_threshold: f64,
    pub auto_resolve_threshold: f64,
    pub enable_fuzzy_matching: bool,
    /// Content-similarity cross-matching, disabled by default: the
    /// source this is grounded on disables it too (too expensive even
    /// with self-dedup preprocessing at real-world issue counts).
    pub enable_content_similarity: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            title_similarity_threshold: 0.90,
            content_similarity_threshold: 0.85,
            auto_resolve_threshold: 0.95,
            enable_fuzzy_matching: false,
            enable_content_similarity: false,
        }
    }
}

pub struct DuplicateDetector {
    config: DetectorConfig,
}

impl DuplicateDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Groups local issues into equivalence classes by exact title,
    /// GitHub-ID collision, and (if enabled) fuzzy title similarity
    /// within a first-three-characters bucket; returns one canonical
    /// issue per class.
    pub fn local_self_dedup(&self, local_issues: &[Issue]) -> Vec<Issue> {
        if local_issues.is_empty() {
            return Vec::new();
        }

        let by_id: HashMap<&str, &Issue> = local_issues.iter().map(|issue| (issue.id.as_str(), issue)).collect();
        let mut uf = UnionFind::new(by_id.keys().copied());

        let mut title_buckets: HashMap<&str, Vec<&str>> = HashMap::new();
        for issue in local_issues {
            title_buckets.entry(issue.title.as_str()).or_default().push(issue.id.as_str());
        }
        for ids in title_buckets.values() {
            for other in &ids[1..] {
                uf.union(&ids[0], other);
            }
        }

        let mut github_id_buckets: HashMap<&str, Vec<&str>> = HashMap::new();
        for issue in local_issues {
            if let Some(github_id) = issue.remote_ids.get("github") {
                github_id_buckets.entry(github_id.as_str()).or_default().push(issue.id.as_str());
            }
        }
        for ids in github_id_buckets.values() {
            for other in &ids[1..] {
                uf.union(&ids[0], other);
            }
        }

        if self.config.enable_fuzzy_matching {
            let mut fuzzy_buckets: HashMap<String, Vec<&Issue>> = HashMap::new();
            for issue in local_issues {
                if title_buckets.get(issue.title.as_str()).is_some_and(|bucket| bucket.len() > 1) {
                    continue;
                }
                let normalized = issue.title.to_lowercase();
                let normalized = normalized.trim();
                if !normalized.is_empty() {
                    let key: String = normalized.chars().take(3).collect();
                    fuzzy_buckets.entry(key).or_default().push(issue);
                }
            }
            for bucket in fuzzy_buckets.values() {
                for (i, issue1) in bucket.iter().enumerate() {
                    for issue2 in &bucket[i + 1..] {
                        if text_similarity(&issue1.title, &issue2.title) >= self.config.title_similarity_threshold {
                            uf.union(&issue1.id.as_str(), &issue2.id.as_str());
                        }
                    }
                }
            }
        }

        uf.get_representatives().into_iter().filter_map(|id| by_id.get(id).map(|issue| (*issue).clone())).collect()
    }

    /// Same grouping strategy as `local_self_dedup`, applied to remote
    /// issues keyed by their map key rather than a struct field.
    pub fn remote_self_dedup(&self, remote_issues: &HashMap<String, SyncIssue>) -> HashMap<String, SyncIssue> {
        if remote_issues.is_empty() {
            return HashMap::new();
        }

        let keys: Vec<&str> = remote_issues.keys().map(String::as_str).collect();
        let mut uf = UnionFind::new(keys.iter().copied());

        let mut title_buckets: HashMap<&str, Vec<&str>> = HashMap::new();
        for key in &keys {
            title_buckets.entry(remote_issues[*key].title.as_str()).or_default().push(key);
        }
        for ids in title_buckets.values() {
            for other in &ids[1..] {
                uf.union(&ids[0], other);
            }
        }

        let mut backend_id_buckets: HashMap<&str, Vec<&str>> = HashMap::new();
        for key in &keys {
            if let Some(backend_id) = remote_issues[*key].backend_id.as_deref() {
                backend_id_buckets.entry(backend_id).or_default().push(key);
            }
        }
        for ids in backend_id_buckets.values() {
            for other in &ids[1..] {
                uf.union(&ids[0], other);
            }
        }

        if self.config.enable_fuzzy_matching {
            let mut fuzzy_buckets: HashMap<String, Vec<&str>> = HashMap::new();
            for key in &keys {
                let title = remote_issues[*key].title.as_str();
                if title_buckets.get(title).is_some_and(|bucket| bucket.len() > 1) {
                    continue;
                }
                let normalized = title.to_lowercase();
                let normalized = normalized.trim();
                if !normalized.is_empty() {
                    let bucket_key: String = normalized.chars().take(3).collect();
                    fuzzy_buckets.entry(bucket_key).or_default().push(key);
                }
            }
            for bucket in fuzzy_buckets.values() {
                for (i, key1) in bucket.iter().enumerate() {
                    for key2 in &bucket[i + 1..] {
                        let similarity = text_similarity(&remote_issues[*key1].title, &remote_issues[*key2].title);
                        if similarity >= self.config.title_similarity_threshold {
                            uf.union(key1, key2);
                        }
                    }
                }
            }
        }

        uf.get_representatives()
            .into_iter()
            .filter_map(|key| remote_issues.get(key).map(|issue| (key.to_string(), issue.clone())))
            .collect()
    }

    /// Runs every cross-side detection strategy over already-deduplicated
    /// inputs and returns matches sorted by descending confidence.
    pub fn detect_all(&self, local_issues: &[Issue], remote_issues: &HashMap<String, SyncIssue>) -> Vec<DuplicateMatch> {
        let mut matches = Vec::new();

        for local_issue in local_issues {
            matches.extend(self.detect_id_collisions(local_issue, remote_issues));
            matches.extend(self.detect_title_duplicates(local_issue, remote_issues));
            if self.config.enable_content_similarity {
                matches.extend(self.detect_content_duplicates(local_issue, remote_issues));
            }
        }

        let mut deduped = Self::deduplicate_matches(matches);
        deduped.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        deduped
    }

    /// Same-GitHub-number, sufficiently-different-content collisions.
    /// Preserves the OR condition from the grounding source: either
    /// divergent title *or* divergent content counts as a collision,
    /// even when the other axis agrees — this over-reports relative to
    /// an AND condition but matches the upstream behavior exactly.
    fn detect_id_collisions(&self, local_issue: &Issue, remote_issues: &HashMap<String, SyncIssue>) -> Vec<DuplicateMatch> {
        let Some(github_number) = local_issue.remote_ids.get("github") else {
            return Vec::new();
        };

        let mut matches = Vec::new();
        for remote_issue in remote_issues.values() {
            let remote_number = (remote_issue.backend_name == "github").then(|| remote_issue.backend_id.as_deref()).flatten();
            if remote_number != Some(github_number.as_str()) {
                continue;
            }

            let title_similarity = text_similarity(&local_issue.title, &remote_issue.title);
            let content_similarity = text_similarity(&local_issue.content, &remote_issue.description);

            if title_similarity >= 0.80 && content_similarity >= 0.80 {
                tracing::debug!(
                    %github_number,
                    title_similarity,
                    content_similarity,
                    "id collision detected but both similarities are high; OR-condition still flags it"
                );
            }
            if title_similarity < 0.80 || content_similarity < 0.80 {
                let matched = DuplicateMatch::new(
                    local_issue.id.as_str(),
                    remote_issue.id.as_str(),
                    remote_issue.backend_name.as_str(),
                    MatchType::IdCollision,
                    1.0,
                    RecommendedAction::ManualReview,
                )
                .expect("confidence 1.0 is in range")
                .with_detail("github_number", github_number.clone().into())
                .with_detail("title_similarity", title_similarity.into())
                .with_detail("content_similarity", content_similarity.into());
                matches.push(matched);
            }
        }
        matches
    }

    fn detect_title_duplicates(&self, local_issue: &Issue, remote_issues: &HashMap<String, SyncIssue>) -> Vec<DuplicateMatch> {
        let local_title = local_issue.title.trim().to_lowercase();
        let mut matches = Vec::new();

        for remote_issue in remote_issues.values() {
            let remote_title = remote_issue.title.trim().to_lowercase();

            if local_title == remote_title {
                let matched = DuplicateMatch::new(
                    local_issue.id.as_str(),
                    remote_issue.id.as_str(),
                    remote_issue.backend_name.as_str(),
                    MatchType::TitleExact,
                    0.98,
                    RecommendedAction::AutoMerge,
                )
                .expect("confidence 0.98 is in range")
                .with_detail("title_similarity", 1.0.into())
                .with_detail("match_reason", "exact_title_match".into());
                matches.push(matched);
                continue;
            }

            let similarity = text_similarity(&local_title, &remote_title);
            if similarity >= self.config.title_similarity_threshold {
                let matched = DuplicateMatch::new(
                    local_issue.id.as_str(),
                    remote_issue.id.as_str(),
                    remote_issue.backend_name.as_str(),
                    MatchType::TitleSimilar,
                    similarity,
                    RecommendedAction::ManualReview,
                )
                .expect("similarity is clamped to [0,1]")
                .with_detail("title_similarity", similarity.into())
                .with_detail("match_reason", "fuzzy_title_match".into());
                matches.push(matched);
            }
        }
        matches
    }

    fn detect_content_duplicates(&self, local_issue: &Issue, remote_issues: &HashMap<String, SyncIssue>) -> Vec<DuplicateMatch> {
        let local_content = local_issue.content.trim();
        if local_content.is_empty() {
            return Vec::new();
        }

        let mut matches = Vec::new();
        for remote_issue in remote_issues.values() {
            let remote_content = remote_issue.description.trim();
            if remote_content.is_empty() {
                continue;
            }

            let content_similarity = text_similarity(local_content, remote_content);
            if content_similarity < self.config.content_similarity_threshold {
                continue;
            }

            let title_similarity = text_similarity(&local_issue.title, &remote_issue.title);
            let combined_confidence = content_similarity * 0.6 + title_similarity * 0.4;
            let action = if combined_confidence >= self.config.auto_resolve_threshold {
                RecommendedAction::AutoMerge
            } else {
                RecommendedAction::ManualReview
            };

            let matched = DuplicateMatch::new(
                local_issue.id.as_str(),
                remote_issue.id.as_str(),
                remote_issue.backend_name.as_str(),
                MatchType::ContentSimilar,
                combined_confidence,
                action,
            )
            .expect("weighted average of two [0,1] scores is in range")
            .with_detail("content_similarity", content_similarity.into())
            .with_detail("title_similarity", title_similarity.into())
            .with_detail("match_reason", "content_similarity".into());
            matches.push(matched);
        }
        matches
    }

    fn deduplicate_matches(matches: Vec<DuplicateMatch>) -> Vec<DuplicateMatch> {
        let mut by_pair: HashMap<(String, String), DuplicateMatch> = HashMap::new();
        for matched in matches {
            let key = (matched.local_entity_id.clone(), matched.remote_entity_id.clone());
            match by_pair.get(&key) {
                Some(existing) if existing.confidence >= matched.confidence => {}
                _ => {
                    by_pair.insert(key, matched);
                }
            }
        }
        by_pair.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadmap_model::IssueStatus;

    fn issue(id: &str, title: &str) -> Issue {
        Issue::new(id, title, IssueStatus::Todo).unwrap()
    }

    fn sync_issue(id: &str, title: &str, backend_name: &str) -> SyncIssue {
        let mut s = SyncIssue::new(id, title, "open").unwrap();
        s.backend_name = backend_name.to_string();
        s
    }

    #[test]
    fn local_self_dedup_collapses_exact_title_matches() {
        let detector = DuplicateDetector::new(DetectorConfig::default());
        let issues = vec![issue("i-1", "Fix the bug"), issue("i-2", "Fix the bug")];
        let deduped = detector.local_self_dedup(&issues);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn local_self_dedup_collapses_github_id_collisions() {
        let detector = DuplicateDetector::new(DetectorConfig::default());
        let mut a = issue("i-1", "Fix the bug");
        a.remote_ids.insert("github".to_string(), "42".to_string());
        let mut b = issue("i-2", "Different title entirely");
        b.remote_ids.insert("github".to_string(), "42".to_string());
        let deduped = detector.local_self_dedup(&[a, b]);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn local_self_dedup_leaves_distinct_issues_alone() {
        let detector = DuplicateDetector::new(DetectorConfig::default());
        let issues = vec![issue("i-1", "Fix the bug"), issue("i-2", "Add a feature")];
        assert_eq!(detector.local_self_dedup(&issues).len(), 2);
    }

    #[test]
    fn remote_self_dedup_collapses_backend_id_collisions() {
        let detector = DuplicateDetector::new(DetectorConfig::default());
        let mut a = sync_issue("r-1", "Fix the bug", "github");
        a.backend_id = Some("42".to_string());
        let mut b = sync_issue("r-2", "Something else", "github");
        b.backend_id = Some("42".to_string());
        let remote: HashMap<String, SyncIssue> = [("r-1".to_string(), a), ("r-2".to_string(), b)].into_iter().collect();
        assert_eq!(detector.remote_self_dedup(&remote).len(), 1);
    }

    #[test]
    fn detect_all_finds_exact_title_cross_match() {
        let detector = DuplicateDetector::new(DetectorConfig::default());
        let local = vec![issue("i-1", "Fix the bug")];
        let remote: HashMap<String, SyncIssue> = [("r-1".to_string(), sync_issue("r-1", "Fix the bug", "github"))].into_iter().collect();

        let matches = detector.detect_all(&local, &remote);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::TitleExact);
        assert_eq!(matches[0].recommended_action, RecommendedAction::AutoMerge);
    }

    #[test]
    fn detect_all_flags_id_collision_with_divergent_content() {
        let detector = DuplicateDetector::new(DetectorConfig::default());
        let mut local_issue = issue("i-1", "Totally different local title");
        local_issue.remote_ids.insert("github".to_string(), "42".to_string());
        let mut remote_issue = sync_issue("r-1", "A completely unrelated remote title", "github");
        remote_issue.backend_id = Some("42".to_string());
        let remote: HashMap<String, SyncIssue> = [("r-1".to_string(), remote_issue)].into_iter().collect();

        let matches = detector.detect_all(&[local_issue], &remote);
        assert!(matches.iter().any(|m| m.match_type == MatchType::IdCollision));
    }

    #[test]
    fn detect_all_sorts_by_descending_confidence() {
        let detector = DuplicateDetector::new(DetectorConfig::default());
        let local = vec![issue("i-1", "Fix the bug"), issue("i-2", "Fix the bug now please")];
        let remote: HashMap<String, SyncIssue> = [("r-1".to_string(), sync_issue("r-1", "Fix the bug", "github"))].into_iter().collect();

        let matches = detector.detect_all(&local, &remote);
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn content_similarity_is_disabled_by_default() {
        let detector = DuplicateDetector::new(DetectorConfig::default());
        let local = vec![issue("i-1", "Totally unrelated title")];
        let mut remote_issue = sync_issue("r-1", "A completely different title", "github");
        remote_issue.description = "shared identical content block".to_string();
        let mut local_with_content = local[0].clone();
        local_with_content.content = "shared identical content block".to_string();
        let remote: HashMap<String, SyncIssue> = [("r-1".to_string(), remote_issue)].into_iter().collect();

        let matches = detector.detect_all(&[local_with_content], &remote);
        assert!(matches.iter().all(|m| m.match_type != MatchType::ContentSimilar));
    }
}
