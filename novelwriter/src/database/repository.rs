//! Repository layer for database operations
//!
//! Stores every application key as one row of the `kv_store` table.

use crate::error::Result;
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

/// SQLite-backed key-value repository
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a stored value
    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    /// Insert or replace a stored value
    pub async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        tracing::debug!("Set value: {} ({} bytes)", key, value.len());
        Ok(())
    }

    /// List stored keys, most recently written first
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT key FROM kv_store ORDER BY updated_at DESC, key ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(keys)
    }
}

#[async_trait]
impl KeyValueStore for Repository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> Repository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Repository::new(pool)
    }

    #[tokio::test]
    async fn test_set_and_get_value() {
        let repo = create_test_repo().await;

        assert_eq!(repo.get_value("novels").await.unwrap(), None);

        repo.set_value("novels", "[]").await.unwrap();
        assert_eq!(repo.get_value("novels").await.unwrap(), Some("[]".to_string()));

        // Update existing
        repo.set_value("novels", r#"[{"id":"1"}]"#).await.unwrap();
        assert_eq!(
            repo.get_value("novels").await.unwrap(),
            Some(r#"[{"id":"1"}]"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_list_keys() {
        let repo = create_test_repo().await;

        repo.set_value("novels", "[]").await.unwrap();
        repo.set_value("chapters", "[]").await.unwrap();

        let mut keys = repo.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["chapters".to_string(), "novels".to_string()]);
    }

    #[tokio::test]
    async fn test_key_value_store_impl() {
        let repo = create_test_repo().await;
        let store: &dyn KeyValueStore = &repo;

        store.set("writing-session", "{}").await.unwrap();
        assert_eq!(store.get("writing-session").await.unwrap(), Some("{}".to_string()));
    }
}
