use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use slashkit_core::storage::StorageError;

use crate::DbPool;

/// Credentials captured when a workspace installs the app. `bot_token` is the
/// per-workspace token used for bot-voiced delivery; `profile` keeps whatever
/// extra install metadata the OAuth exchange returned.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceRecord {
    pub team: String,
    pub bot_token: String,
    pub profile: serde_json::Value,
}

#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    async fn find_by_team(&self, team: &str) -> Result<Option<WorkspaceRecord>, StorageError>;

    /// Inserts the workspace or replaces its credentials on re-install.
    async fn upsert(&self, record: WorkspaceRecord) -> Result<(), StorageError>;

    async fn list(&self) -> Result<Vec<WorkspaceRecord>, StorageError>;

    async fn ensure_schema(&self) -> Result<(), StorageError>;
}

pub struct SqlWorkspaceRepository {
    pool: DbPool,
}

impl SqlWorkspaceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn row_to_record(row: &SqliteRow) -> Result<WorkspaceRecord, StorageError> {
    let team: String = row.try_get("team_id").map_err(backend)?;
    let bot_token: String = row.try_get("bot_token").map_err(backend)?;
    let raw_profile: String = row.try_get("profile").map_err(backend)?;
    let profile = serde_json::from_str(&raw_profile).map_err(|err| StorageError::Corrupt {
        session_id: team.clone(),
        detail: err.to_string(),
    })?;
    Ok(WorkspaceRecord { team, bot_token, profile })
}

#[async_trait]
impl WorkspaceRepository for SqlWorkspaceRepository {
    async fn find_by_team(&self, team: &str) -> Result<Option<WorkspaceRecord>, StorageError> {
        let row = sqlx::query("SELECT team_id, bot_token, profile FROM workspace WHERE team_id = ?")
            .bind(team)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn upsert(&self, record: WorkspaceRecord) -> Result<(), StorageError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO workspace (team_id, bot_token, profile, installed_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (team_id)
             DO UPDATE SET bot_token = excluded.bot_token,
                           profile = excluded.profile,
                           updated_at = excluded.updated_at",
        )
        .bind(&record.team)
        .bind(&record.bot_token)
        .bind(record.profile.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkspaceRecord>, StorageError> {
        let rows = sqlx::query("SELECT team_id, bot_token, profile FROM workspace")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS workspace (
                 team_id TEXT PRIMARY KEY,
                 bot_token TEXT NOT NULL,
                 profile TEXT NOT NULL,
                 installed_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::{SqlWorkspaceRepository, WorkspaceRecord, WorkspaceRepository};

    async fn repository() -> SqlWorkspaceRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        let repository = SqlWorkspaceRepository::new(pool);
        repository.ensure_schema().await.expect("schema");
        repository
    }

    fn record(team: &str, bot_token: &str) -> WorkspaceRecord {
        WorkspaceRecord {
            team: team.to_owned(),
            bot_token: bot_token.to_owned(),
            profile: json!({"team_name": "acme"}),
        }
    }

    #[tokio::test]
    async fn upsert_then_find_round_trips() {
        let repository = repository().await;
        repository.upsert(record("T1", "xoxb-1")).await.unwrap();

        let found = repository.find_by_team("T1").await.unwrap().expect("record");
        assert_eq!(found.bot_token, "xoxb-1");
        assert_eq!(found.profile["team_name"], json!("acme"));
        assert!(repository.find_by_team("T2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reinstall_replaces_credentials() {
        let repository = repository().await;
        repository.upsert(record("T1", "xoxb-1")).await.unwrap();
        repository.upsert(record("T1", "xoxb-2")).await.unwrap();

        let all = repository.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].bot_token, "xoxb-2");
    }

    #[tokio::test]
    async fn list_returns_every_installed_workspace() {
        let repository = repository().await;
        repository.upsert(record("T1", "xoxb-1")).await.unwrap();
        repository.upsert(record("T2", "xoxb-2")).await.unwrap();

        let mut teams: Vec<String> =
            repository.list().await.unwrap().into_iter().map(|r| r.team).collect();
        teams.sort();
        assert_eq!(teams, vec!["T1", "T2"]);
    }
}
