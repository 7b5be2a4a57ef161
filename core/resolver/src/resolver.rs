//! Turns `DuplicateMatch`es into `ResolutionAction`s. Automatic
//! resolution only ever emits `link` (never merges or deletes — the
//! remote side of a match may not exist locally yet during sync
//! analysis; actual mutation happens later, once both sides are
//! materialized, in the Sync Executor). Interactive resolution records
//! whatever the operator chose without performing it either.

use roadmap_model::{ActionTag, DuplicateMatch, RecommendedAction, ResolutionAction};

use crate::interaction::{InteractionPort, InteractiveDecision};

pub struct DuplicateResolver {
    auto_resolve_threshold: f64,
}

impl DuplicateResolver {
    pub fn new(auto_resolve_threshold: f64) -> Self {
        Self { auto_resolve_threshold }
    }

    /// For each match: skip unless it clears `auto_resolve_threshold`
    /// *and* carries `RecommendedAction::AutoMerge`; otherwise emit a
    /// `link` action pairing the local entity to the remote one.
    pub fn resolve_automatic(&self, matches: Vec<DuplicateMatch>) -> Vec<ResolutionAction> {
        matches
            .into_iter()
            .map(|matched| {
                let eligible = matched.confidence >= self.auto_resolve_threshold && matched.recommended_action == RecommendedAction::AutoMerge;
                if !eligible {
                    tracing::debug!(
                        local_id = %matched.local_entity_id,
                        remote_id = %matched.remote_entity_id,
                        confidence = matched.confidence,
                        "skipping automatic resolution"
                    );
                    let local_id = matched.local_entity_id.clone();
                    let remote_id = matched.remote_entity_id.clone();
                    return ResolutionAction::new(matched, ActionTag::Skip, local_id, remote_id);
                }

                tracing::info!(
                    local_id = %matched.local_entity_id,
                    remote_id = %matched.remote_entity_id,
                    confidence = matched.confidence,
                    "auto-resolving duplicate as link"
                );
                let local_id = matched.local_entity_id.clone();
                let remote_id = matched.remote_entity_id.clone();
                ResolutionAction::new(matched, ActionTag::Link, local_id, remote_id)
            })
            .collect()
    }

    /// Presents every match to `port` in turn and records its decision.
    /// A `Merge` decision is recorded as such but not executed here.
    pub fn resolve_interactive(&self, matches: Vec<DuplicateMatch>, port: &mut impl InteractionPort) -> Vec<ResolutionAction> {
        matches
            .into_iter()
            .map(|matched| {
                let decision = port.decide(&matched);
                let local_id = matched.local_entity_id.clone();
                let remote_id = matched.remote_entity_id.clone();
                match decision {
                    InteractiveDecision::Merge => {
                        tracing::info!(local_id = %local_id, remote_id = %remote_id, "operator merged duplicate");
                        ResolutionAction::new(matched, ActionTag::Merge, local_id, remote_id)
                    }
                    InteractiveDecision::Keep => {
                        tracing::info!(local_id = %local_id, remote_id = %remote_id, "operator kept duplicate separate");
                        ResolutionAction::new(matched, ActionTag::Keep, local_id, remote_id)
                    }
                    InteractiveDecision::Skip => {
                        tracing::info!(local_id = %local_id, remote_id = %remote_id, "operator skipped match");
                        ResolutionAction::new(matched, ActionTag::Skip, local_id, remote_id)
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::AlwaysSkipPort;
    use roadmap_model::MatchType;

    fn matched(confidence: f64, action: RecommendedAction) -> DuplicateMatch {
        DuplicateMatch::new("i-1", "r-1", "github", MatchType::TitleExact, confidence, action).unwrap()
    }

    #[test]
    fn high_confidence_auto_merge_becomes_link() {
        let resolver = DuplicateResolver::new(0.95);
        let actions = resolver.resolve_automatic(vec![matched(0.98, RecommendedAction::AutoMerge)]);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, ActionTag::Link);
    }

    #[test]
    fn below_threshold_is_skipped() {
        let resolver = DuplicateResolver::new(0.95);
        let actions = resolver.resolve_automatic(vec![matched(0.80, RecommendedAction::AutoMerge)]);
        assert_eq!(actions[0].action, ActionTag::Skip);
    }

    #[test]
    fn manual_review_recommendation_is_never_auto_resolved() {
        let resolver = DuplicateResolver::new(0.95);
        let actions = resolver.resolve_automatic(vec![matched(0.99, RecommendedAction::ManualReview)]);
        assert_eq!(actions[0].action, ActionTag::Skip);
    }

    #[test]
    fn interactive_resolution_with_headless_port_always_skips() {
        let resolver = DuplicateResolver::new(0.95);
        let mut port = AlwaysSkipPort;
        let actions = resolver.resolve_interactive(vec![matched(0.5, RecommendedAction::ManualReview)], &mut port);
        assert_eq!(actions[0].action, ActionTag::Skip);
    }
}
