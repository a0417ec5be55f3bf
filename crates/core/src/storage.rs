//! Durable session storage, specified at its interface boundary.
//!
//! The SQL implementation lives in `slashkit-db`; `MemorySessionRepository`
//! here backs tests and storage-less deployments.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;

use crate::session::SessionScope;
use crate::state::StateMap;

/// One durable session row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionRecord {
    pub session_id: String,
    pub user: String,
    pub team: Option<String>,
    pub state: StateMap,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("corrupt session state for `{session_id}`: {detail}")]
    Corrupt { session_id: String, detail: String },
}

/// Keyed record store for sessions.
///
/// Lookup honors the scope discipline: multi-party scopes match on session
/// id alone; single-party scopes additionally require the user and a
/// compatible tenant (tenant-absent legacy records match any tenant).
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find(&self, scope: &SessionScope) -> Result<Option<SessionRecord>, StorageError>;

    async fn insert(&self, record: SessionRecord) -> Result<(), StorageError>;

    /// Updates the matched record in place, back-filling `team` on legacy
    /// tenant-less rows.
    async fn update(
        &self,
        scope: &SessionScope,
        state: StateMap,
        team: Option<String>,
    ) -> Result<(), StorageError>;

    async fn ensure_schema(&self) -> Result<(), StorageError>;
}

/// Schema-ensure-exists handle, passed to the `init_db` hook so commands
/// and plugins can provision their own tables.
#[async_trait]
pub trait SchemaExt: Send + Sync {
    async fn ensure_table(&self, name: &str, columns: &str) -> Result<(), StorageError>;
}

/// In-process durable tier: a plain record list behind a mutex. Backs
/// tests and storage-less deployments.
#[derive(Debug, Default)]
pub struct MemorySessionRepository {
    records: Mutex<Vec<SessionRecord>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SessionRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn matches(scope: &SessionScope, record: &SessionRecord) -> bool {
        if record.session_id != scope.session_id {
            return false;
        }
        if scope.multi {
            return true;
        }
        record.user == scope.user && scope.team_matches(record.team.as_deref())
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn find(&self, scope: &SessionScope) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self.lock().iter().find(|record| Self::matches(scope, record)).cloned())
    }

    async fn insert(&self, record: SessionRecord) -> Result<(), StorageError> {
        self.lock().push(record);
        Ok(())
    }

    async fn update(
        &self,
        scope: &SessionScope,
        state: StateMap,
        team: Option<String>,
    ) -> Result<(), StorageError> {
        let mut records = self.lock();
        if let Some(record) = records.iter_mut().find(|record| Self::matches(scope, record)) {
            record.state = state;
            if team.is_some() {
                record.team = team;
            }
        }
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{MemorySessionRepository, SessionRecord, SessionRepository};
    use crate::session::SessionScope;
    use crate::state::StateMap;

    fn scope(session_id: &str, user: &str, team: Option<&str>, multi: bool) -> SessionScope {
        SessionScope {
            session_id: session_id.to_owned(),
            user: user.to_owned(),
            team: team.map(str::to_owned),
            multi,
        }
    }

    fn record(session_id: &str, user: &str, team: Option<&str>) -> SessionRecord {
        SessionRecord {
            session_id: session_id.to_owned(),
            user: user.to_owned(),
            team: team.map(str::to_owned),
            state: StateMap::new(),
        }
    }

    #[tokio::test]
    async fn single_party_lookup_requires_the_user() {
        let repo = MemorySessionRepository::new();
        repo.insert(record("todo", "U1", None)).await.unwrap();
        assert!(repo.find(&scope("todo", "U1", None, false)).await.unwrap().is_some());
        assert!(repo.find(&scope("todo", "U2", None, false)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn multi_party_lookup_matches_on_session_id_alone() {
        let repo = MemorySessionRepository::new();
        repo.insert(record("poll-U1-U2", "U1", None)).await.unwrap();
        assert!(repo.find(&scope("poll-U1-U2", "U9", None, true)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn legacy_records_match_any_tenant_and_get_back_filled() {
        let repo = MemorySessionRepository::new();
        repo.insert(record("todo", "U1", None)).await.unwrap();
        let scoped = scope("todo", "U1", Some("T1"), false);
        assert!(repo.find(&scoped).await.unwrap().is_some());

        let mut state = StateMap::new();
        state.insert("done".to_owned(), json!(true));
        repo.update(&scoped, state, Some("T1".to_owned())).await.unwrap();
        let records = repo.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].team.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn tenant_scoped_records_do_not_leak_across_teams() {
        let repo = MemorySessionRepository::new();
        repo.insert(record("todo", "U1", Some("T1"))).await.unwrap();
        assert!(repo.find(&scope("todo", "U1", Some("T2"), false)).await.unwrap().is_none());
        assert!(repo.find(&scope("todo", "U1", Some("T1"), false)).await.unwrap().is_some());
    }
}
