//! Remote Backend Port: the only component permitted to know a remote
//! tracker's wire format. Every implementation normalizes into
//! `SyncIssue`/`SyncMilestone` and translates transport/status failures
//! into `SyncError` before returning — nothing backend-specific crosses
//! this boundary.

pub mod git;
pub mod github;
pub mod http;
pub mod port;
pub mod registry;
pub mod team_cache;

pub use git::GitBackend;
pub use github::GitHubBackend;
pub use port::{IssueFilter, IssuePayload, MilestonePayload, RemoteBackendPort};
pub use registry::{create_default_registry, BackendFactory, BackendRegistry};
pub use team_cache::TeamMemberCache;
