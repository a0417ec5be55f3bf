use async_trait::async_trait;

use slashkit_core::storage::{SchemaExt, StorageError};

use crate::DbPool;

/// Schema-ensure-exists handle over the shared pool. Handed to `init_db`
/// hooks so commands and plugins can provision their own tables alongside
/// the framework's.
#[derive(Clone)]
pub struct SqlSchema {
    pool: DbPool,
}

impl SqlSchema {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SchemaExt for SqlSchema {
    async fn ensure_table(&self, name: &str, columns: &str) -> Result<(), StorageError> {
        sqlx::query(&format!("CREATE TABLE IF NOT EXISTS {name} ({columns})"))
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use slashkit_core::storage::SchemaExt;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Row;

    use super::SqlSchema;

    async fn pool() -> crate::DbPool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool")
    }

    #[tokio::test]
    async fn ensure_table_is_idempotent() {
        let schema = SqlSchema::new(pool().await);
        schema.ensure_table("poll", "id TEXT PRIMARY KEY, question TEXT").await.unwrap();
        schema.ensure_table("poll", "id TEXT PRIMARY KEY, question TEXT").await.unwrap();

        let row = sqlx::query("SELECT count(*) AS n FROM sqlite_master WHERE name = 'poll'")
            .fetch_one(schema.pool())
            .await
            .unwrap();
        let count: i64 = row.try_get("n").unwrap();
        assert_eq!(count, 1);
    }
}
