//! The prompt mechanism interactive resolution delegates to. Asking a
//! human is CLI-glue and out of this crate's scope; `InteractionPort` is
//! the seam that lets the terminal prompt loop live elsewhere while this
//! crate's decision logic stays testable without a terminal.

use roadmap_model::DuplicateMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveDecision {
    Merge,
    Keep,
    Skip,
}

pub trait InteractionPort {
    /// Presents `matched` to the operator and returns their choice.
    fn decide(&mut self, matched: &DuplicateMatch) -> InteractiveDecision;
}

/// A headless port that always skips, for non-interactive runs and
/// tests. Mirrors the grounding source's own fallback when its terminal
/// prompt library is unavailable.
pub struct AlwaysSkipPort;

impl InteractionPort for AlwaysSkipPort {
    fn decide(&mut self, _matched: &DuplicateMatch) -> InteractiveDecision {
        InteractiveDecision::Skip
    }
}
