//! Selects a `RemoteBackendPort` implementation by the project
//! config's `sync_backend` field. Mirrors the factory-by-name registry
//! pattern used elsewhere for provider selection: a name maps to a
//! constructor closure, resolved lazily rather than all backends being
//! built up front.

use std::collections::HashMap;
use std::sync::Arc;

use roadmap_common::{SyncError, SyncErrorType, SyncResult};

use crate::git::GitBackend;
use crate::github::GitHubBackend;
use crate::port::RemoteBackendPort;

pub type BackendFactory = Box<dyn Fn() -> SyncResult<Arc<dyn RemoteBackendPort>> + Send + Sync>;

#[derive(Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, factory: BackendFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn resolve(&self, name: &str) -> SyncResult<Arc<dyn RemoteBackendPort>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            SyncError::new(SyncErrorType::ConfigurationError, format!("unknown sync backend '{name}'"))
                .with_suggestion("Set sync_backend to one of the registered backends (e.g. github, git)")
        })?;
        factory()
    }

    pub fn has_backend(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

/// Registers the `git` no-op backend unconditionally, and a `github`
/// backend when a token/owner/repo triple is supplied.
pub fn create_default_registry(github_token: Option<String>, github_owner: Option<String>, github_repo: Option<String>) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register("git", Box::new(|| Ok(Arc::new(GitBackend::new()) as Arc<dyn RemoteBackendPort>)));

    if let (Some(token), Some(owner), Some(repo)) = (github_token, github_owner, github_repo) {
        registry.register(
            "github",
            Box::new(move || GitHubBackend::new(&token, owner.clone(), repo.clone()).map(|b| Arc::new(b) as Arc<dyn RemoteBackendPort>)),
        );
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_backend_is_a_configuration_error() {
        let registry = BackendRegistry::new();
        let err = registry.resolve("nonexistent").unwrap_err();
        assert_eq!(err.category, SyncErrorType::ConfigurationError);
    }

    #[test]
    fn default_registry_always_has_git() {
        let registry = create_default_registry(None, None, None);
        assert!(registry.has_backend("git"));
        assert!(!registry.has_backend("github"));
    }

    #[test]
    fn default_registry_adds_github_when_configured() {
        let registry = create_default_registry(Some("tok".to_string()), Some("owner".to_string()), Some("repo".to_string()));
        assert!(registry.has_backend("github"));
    }
}
