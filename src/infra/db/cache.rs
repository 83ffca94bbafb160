//! Eligible lists in the `eligible_cache` table, shared by every process.

use std::sync::Arc;

use async_trait::async_trait;
use time::Duration;

use crate::{
    application::repos::RepoError,
    cache::{Clock, EligibleCacheStore, EligibleKey},
    domain::entities::ItemId,
};

use super::{PostgresRepositories, map_sqlx_error};

pub struct PostgresEligibleStore {
    repos: PostgresRepositories,
    clock: Arc<dyn Clock>,
}

impl PostgresEligibleStore {
    pub fn new(repos: PostgresRepositories, clock: Arc<dyn Clock>) -> Self {
        Self { repos, clock }
    }

    /// Delete expired rows. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM eligible_cache WHERE expires_at <= $1")
            .bind(self.clock.now())
            .execute(self.repos.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl EligibleCacheStore for PostgresEligibleStore {
    async fn get(&self, key: &EligibleKey) -> Result<Option<Vec<ItemId>>, RepoError> {
        sqlx::query_scalar::<_, Vec<i64>>(
            "SELECT item_ids FROM eligible_cache WHERE cache_key = $1 AND expires_at > $2",
        )
        .bind(key.as_str())
        .bind(self.clock.now())
        .fetch_optional(self.repos.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn put(
        &self,
        key: &EligibleKey,
        ids: &[ItemId],
        ttl: Duration,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO eligible_cache (cache_key, item_ids, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (cache_key) DO UPDATE
            SET item_ids = EXCLUDED.item_ids, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key.as_str())
        .bind(ids)
        .bind(self.clock.now() + ttl)
        .execute(self.repos.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove(&self, key: &EligibleKey) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM eligible_cache WHERE cache_key = $1")
            .bind(key.as_str())
            .execute(self.repos.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
