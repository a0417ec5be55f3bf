use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use slashkit_core::session::SessionScope;
use slashkit_core::state::StateMap;
use slashkit_core::storage::{SessionRecord, SessionRepository, StorageError};

use crate::DbPool;

/// Durable tier of the session store.
///
/// Sessions are keyed by (session_id, user_id); multi-party sessions are
/// looked up by session_id alone. Tenant-less rows predate multi-tenant
/// support: they match any tenant-scoped lookup and get their team id
/// back-filled on the next update.
pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn row_to_record(row: &SqliteRow) -> Result<SessionRecord, StorageError> {
    let session_id: String = row.try_get("session_id").map_err(backend)?;
    let user: String = row.try_get("user_id").map_err(backend)?;
    let team: Option<String> = row.try_get("team_id").map_err(backend)?;
    let raw_state: String = row.try_get("state").map_err(backend)?;
    let state: StateMap = serde_json::from_str(&raw_state).map_err(|err| {
        StorageError::Corrupt { session_id: session_id.clone(), detail: err.to_string() }
    })?;
    Ok(SessionRecord { session_id, user, team, state })
}

const SELECT: &str = "SELECT session_id, user_id, team_id, state FROM session";

#[async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find(&self, scope: &SessionScope) -> Result<Option<SessionRecord>, StorageError> {
        if scope.multi {
            let row = sqlx::query(&format!("{SELECT} WHERE session_id = ? LIMIT 1"))
                .bind(&scope.session_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
            return row.as_ref().map(row_to_record).transpose();
        }

        // Tenant-scoped lookup first, then the tenant-less legacy fallback.
        if let Some(team) = &scope.team {
            let row = sqlx::query(&format!(
                "{SELECT} WHERE session_id = ? AND user_id = ? AND team_id = ?"
            ))
            .bind(&scope.session_id)
            .bind(&scope.user)
            .bind(team)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
            if let Some(row) = row {
                return row_to_record(&row).map(Some);
            }
        }
        let row = sqlx::query(&format!(
            "{SELECT} WHERE session_id = ? AND user_id = ? AND team_id IS NULL"
        ))
        .bind(&scope.session_id)
        .bind(&scope.user)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn insert(&self, record: SessionRecord) -> Result<(), StorageError> {
        let state = serde_json::Value::Object(record.state).to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO session (session_id, user_id, team_id, state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.session_id)
        .bind(&record.user)
        .bind(&record.team)
        .bind(state)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn update(
        &self,
        scope: &SessionScope,
        state: StateMap,
        team: Option<String>,
    ) -> Result<(), StorageError> {
        let state = serde_json::Value::Object(state).to_string();
        let now = Utc::now().to_rfc3339();
        let result = if scope.multi {
            sqlx::query("UPDATE session SET state = ?, updated_at = ? WHERE session_id = ?")
                .bind(state)
                .bind(&now)
                .bind(&scope.session_id)
                .execute(&self.pool)
                .await
                .map_err(backend)?
        } else {
            // COALESCE back-fills the tenant on legacy rows without
            // clearing it when the trigger carries none.
            sqlx::query(
                "UPDATE session
                 SET state = ?, team_id = COALESCE(?, team_id), updated_at = ?
                 WHERE session_id = ? AND user_id = ? AND (team_id = ? OR team_id IS NULL)",
            )
            .bind(state)
            .bind(&team)
            .bind(&now)
            .bind(&scope.session_id)
            .bind(&scope.user)
            .bind(&scope.team)
            .execute(&self.pool)
            .await
            .map_err(backend)?
        };
        if result.rows_affected() == 0 {
            tracing::warn!(
                session_id = %scope.session_id,
                "update matched no session record"
            );
        }
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS session (
                 session_id TEXT NOT NULL,
                 user_id TEXT NOT NULL,
                 team_id TEXT,
                 state TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL,
                 PRIMARY KEY (session_id, user_id)
             )",
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_session_team ON session (team_id)")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
