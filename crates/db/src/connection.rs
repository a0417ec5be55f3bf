use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// Pool sizing knobs. The defaults suit a single webhook server process;
/// callers embedding the framework in a larger service can tighten or widen
/// them with [`connect_with_settings`].
#[derive(Clone, Copy, Debug)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self { max_connections: 5, acquire_timeout: Duration::from_secs(30) }
    }
}

/// Opens the session database with default [`PoolSettings`].
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, PoolSettings::default()).await
}

/// Opens the session database and applies the pragmas a long-running
/// webhook server wants on SQLite: WAL for concurrent readers and a busy
/// timeout so writers queue instead of failing. The session and workspace
/// tables carry no cross-table references, so foreign key enforcement
/// stays at SQLite's default (off).
pub async fn connect_with_settings(
    database_url: &str,
    settings: PoolSettings,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .acquire_timeout(settings.acquire_timeout)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{connect_with_settings, PoolSettings};

    #[tokio::test]
    async fn pool_opens_and_serves_queries() {
        let settings =
            PoolSettings { max_connections: 1, acquire_timeout: Duration::from_secs(5) };
        let pool = connect_with_settings("sqlite::memory:", settings).await.expect("connect");
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.expect("query");
        assert_eq!(one, 1);
    }
}
