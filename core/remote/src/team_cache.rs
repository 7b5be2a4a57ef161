//! Caches a repository's collaborator logins so `create_issue`/
//! `update_issue` can drop an unknown assignee from the payload instead
//! of letting GitHub reject the whole request with a 422.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

const TTL: Duration = Duration::from_secs(5 * 60);

struct Cached {
    logins: HashSet<String>,
    fetched_at: Instant,
}

/// Refreshed on demand, not eagerly — the first `validate_assignee`
/// call after expiry (or before the first fetch) pays the refresh cost.
pub struct TeamMemberCache {
    state: Mutex<Option<Cached>>,
}

impl TeamMemberCache {
    pub fn new() -> Self {
        Self { state: Mutex::new(None) }
    }

    /// Returns `true` when `login` is a known collaborator, refreshing
    /// the cache via `fetch` first if it's missing or stale.
    pub async fn validate_assignee<F, Fut>(&self, login: &str, fetch: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = HashSet<String>>,
    {
        let mut guard = self.state.lock().await;
        let needs_refresh = match guard.as_ref() {
            None => true,
            Some(cached) => cached.fetched_at.elapsed() >= TTL,
        };
        if needs_refresh {
            let logins = fetch().await;
            *guard = Some(Cached { logins, fetched_at: Instant::now() });
        }
        guard.as_ref().is_some_and(|cached| cached.logins.contains(login))
    }
}

impl Default for TeamMemberCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_fetches_and_caches() {
        let cache = TeamMemberCache::new();
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let ok = cache
            .validate_assignee("octocat", || async move {
                calls_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                HashSet::from(["octocat".to_string()])
            })
            .await;
        assert!(ok);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let ok2 = cache.validate_assignee("octocat", || async { unreachable!("should be cached") }).await;
        assert!(ok2);
    }

    #[tokio::test]
    async fn unknown_login_is_rejected() {
        let cache = TeamMemberCache::new();
        let ok = cache
            .validate_assignee("nobody", || async { HashSet::from(["someone-else".to_string()]) })
            .await;
        assert!(!ok);
    }
}
