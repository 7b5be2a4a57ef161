//! Duplicate Resolver: turns the Duplicate Detector's matches into
//! resolution actions, either automatically (threshold-gated, `link`
//! only) or interactively (via a swappable `InteractionPort`).

pub mod interaction;
pub mod resolver;

pub use interaction::{AlwaysSkipPort, InteractionPort, InteractiveDecision};
pub use resolver::DuplicateResolver;
