use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    application::repos::{RepoError, VisibilityTermsRepo},
    domain::entities::ItemId,
    domain::types::VisibilityTerm,
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl VisibilityTermsRepo for PostgresRepositories {
    async fn terms_for_item(&self, item: ItemId) -> Result<BTreeSet<VisibilityTerm>, RepoError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT term FROM item_visibility_terms WHERE item_id = $1",
        )
        .bind(item)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut terms = BTreeSet::new();
        for row in rows {
            match VisibilityTerm::try_from(row.as_str()) {
                Ok(term) => {
                    terms.insert(term);
                }
                Err(()) => warn!(
                    target = "sponsorship::infra::db::visibility",
                    item_id = item,
                    term = %row,
                    "Skipping unknown visibility term"
                ),
            }
        }
        Ok(terms)
    }

    async fn set_terms(&self, item: ItemId, terms: &[VisibilityTerm]) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM item_visibility_terms WHERE item_id = $1")
            .bind(item)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        for term in terms {
            sqlx::query(
                "INSERT INTO item_visibility_terms (item_id, term) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(item)
            .bind(term.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }
}
