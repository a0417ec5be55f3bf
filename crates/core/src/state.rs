//! Shared session state containers.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

/// The opaque session payload: a keyed mapping of serializable values.
pub type StateMap = serde_json::Map<String, Value>;

/// A session's state behind a stable container reference.
///
/// The memory cache and the handler context hold clones of the same
/// `SharedState`; in-place mutation through one is immediately visible
/// through the other. "Replacing" the state rewrites the container's
/// contents and never swaps the container identity, so cached references
/// stay live across replacements.
#[derive(Clone, Debug, Default)]
pub struct SharedState {
    inner: Arc<Mutex<StateMap>>,
}

impl SharedState {
    pub fn new(map: StateMap) -> Self {
        Self { inner: Arc::new(Mutex::new(map)) }
    }

    fn lock(&self) -> MutexGuard<'_, StateMap> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.lock().insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    /// Rewrites the contents in place, keeping the container identity.
    pub fn replace(&self, map: StateMap) {
        let mut guard = self.lock();
        guard.clear();
        guard.extend(map);
    }

    /// Runs `f` with mutable access to the underlying map.
    pub fn with_mut<T>(&self, f: impl FnOnce(&mut StateMap) -> T) -> T {
        f(&mut self.lock())
    }

    /// A copy of the current contents, used when persisting.
    pub fn snapshot(&self) -> StateMap {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// True iff both handles point at the same container.
    pub fn ptr_eq(&self, other: &SharedState) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
