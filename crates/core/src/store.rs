//! The two-tier session store.
//!
//! Resolution consults the process-local memory cache first, then the
//! durable repository (skipped for stateless commands), and finally admits
//! a freshly initialized state. Cache entries hold [`SharedState`] handles,
//! so a second resolution in the same process returns the *same* container
//! and in-place mutation is visible without re-reading storage.
//!
//! The cache mutex protects individual reads and writes only; concurrent
//! invocations for the same key can still interleave resolve and persist.
//! That best-effort guarantee is accepted (and now visible, since the cache
//! is an explicit injected object rather than a module-level singleton).

use std::sync::{Arc, Mutex, MutexGuard};

use crate::session::SessionScope;
use crate::state::{SharedState, StateMap};
use crate::storage::{SessionRecord, SessionRepository, StorageError};

struct CacheEntry {
    session_id: String,
    user: String,
    team: Option<String>,
    state: SharedState,
}

impl CacheEntry {
    fn matches(&self, scope: &SessionScope) -> bool {
        if self.session_id != scope.session_id {
            return false;
        }
        if scope.multi {
            return true;
        }
        self.user == scope.user && scope.team_matches(self.team.as_deref())
    }
}

/// Process-wide session cache: unbounded, append-only, populated lazily.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<Vec<CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn find(&self, scope: &SessionScope) -> Option<SharedState> {
        self.lock().iter().find(|entry| entry.matches(scope)).map(|entry| entry.state.clone())
    }

    pub fn admit(
        &self,
        session_id: String,
        user: String,
        team: Option<String>,
        state: SharedState,
    ) {
        self.lock().push(CacheEntry { session_id, user, team, state });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Owns the memory cache and the durable tier.
pub struct SessionStore {
    cache: MemoryCache,
    repository: Arc<dyn SessionRepository>,
}

impl SessionStore {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self { cache: MemoryCache::new(), repository }
    }

    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }

    /// Looks the session up, cache first. Returns `None` on a total miss;
    /// the caller then runs the command's initializer and calls
    /// [`SessionStore::create`].
    pub async fn resolve(
        &self,
        scope: &SessionScope,
        stateful: bool,
    ) -> Result<Option<SharedState>, StorageError> {
        if let Some(state) = self.cache.find(scope) {
            tracing::debug!(session_id = %scope.session_id, "session cache hit");
            return Ok(Some(state));
        }
        if !stateful {
            return Ok(None);
        }
        let Some(record) = self.repository.find(scope).await? else {
            return Ok(None);
        };
        tracing::debug!(session_id = %scope.session_id, "session restored from storage");
        let state = SharedState::new(record.state);
        self.cache.admit(record.session_id, record.user, record.team, state.clone());
        Ok(Some(state))
    }

    /// Admits a freshly initialized session to the cache and returns its
    /// state handle. Fresh sessions are not yet tenant-scoped; the tenant
    /// is recorded on first persist.
    pub fn create(&self, scope: &SessionScope, initial: StateMap) -> SharedState {
        let state = SharedState::new(initial);
        self.cache.admit(scope.session_id.clone(), scope.user.clone(), None, state.clone());
        state
    }

    /// Writes the state's current contents to durable storage: update in
    /// place when a record exists (back-filling the tenant on legacy rows),
    /// insert otherwise. No-op for stateless commands.
    pub async fn persist(
        &self,
        scope: &SessionScope,
        stateful: bool,
        state: &SharedState,
    ) -> Result<(), StorageError> {
        if !stateful {
            return Ok(());
        }
        let snapshot = state.snapshot();
        if self.repository.find(scope).await?.is_some() {
            self.repository.update(scope, snapshot, scope.team.clone()).await
        } else {
            self.repository
                .insert(SessionRecord {
                    session_id: scope.session_id.clone(),
                    user: scope.user.clone(),
                    team: scope.team.clone(),
                    state: snapshot,
                })
                .await
        }
    }
}
