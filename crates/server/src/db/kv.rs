use async_trait::async_trait;
use deadpool_postgres::Pool;
use trialscribe_core::{KeyValueStore, MatchError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

/// Key-value store on a single PostgreSQL table
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create the backing table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), MatchError> {
        let client = self.pool.get().await.map_err(storage)?;
        client.batch_execute(SCHEMA).await.map_err(storage)?;
        Ok(())
    }
}

fn storage(err: impl std::fmt::Display) -> MatchError {
    MatchError::Storage(format!("Database error: {}", err))
}

#[async_trait]
impl KeyValueStore for PostgresStore {
    async fn get(&self, key: &str) -> Result<Option<String>, MatchError> {
        let client = self.pool.get().await.map_err(storage)?;
        let row = client
            .query_opt("SELECT value FROM kv_store WHERE key = $1", &[&key])
            .await
            .map_err(storage)?;
        Ok(row.map(|row| row.get(0)))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), MatchError> {
        let client = self.pool.get().await.map_err(storage)?;
        client
            .execute(
                "INSERT INTO kv_store (key, value) VALUES ($1, $2)
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
                &[&key, &value],
            )
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), MatchError> {
        let client = self.pool.get().await.map_err(storage)?;
        client.query_one("SELECT 1", &[]).await.map_err(storage)?;
        Ok(())
    }
}
