//! Postgres-backed repository implementations.

mod cache;
mod campaigns;
mod content;
mod util;
mod visibility;

pub use cache::PostgresEligibleStore;
pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::domain::query::ContentQuery;
use crate::domain::types::{MetaCompare, MetaValueType};

use util::like_contains;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Append ` AND ...` conditions for `filter` to a query over `content_items c`.
    fn apply_content_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ContentQuery) {
        if !filter.content_types.is_empty() {
            qb.push(" AND c.content_type = ANY(");
            qb.push_bind(filter.content_types.clone());
            qb.push(")");
        }

        if !filter.statuses.is_empty() {
            qb.push(" AND c.status IN (");
            let mut statuses = qb.separated(", ");
            for status in &filter.statuses {
                statuses.push_bind(*status);
            }
            qb.push(")");
        }

        if !filter.ids.is_empty() {
            qb.push(" AND c.id = ANY(");
            qb.push_bind(filter.ids.clone());
            qb.push(")");
        }

        if !filter.campaigns.is_empty() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM item_campaigns ic WHERE ic.item_id = c.id AND ic.campaign_id = ANY(",
            );
            qb.push_bind(filter.campaigns.clone());
            qb.push("))");
        }

        if !filter.exclude_terms.is_empty() {
            let terms: Vec<String> = filter
                .exclude_terms
                .iter()
                .map(|term| term.as_str().to_string())
                .collect();
            qb.push(
                " AND NOT EXISTS (SELECT 1 FROM item_visibility_terms t WHERE t.item_id = c.id AND t.term = ANY(",
            );
            qb.push_bind(terms);
            qb.push("))");
        }

        if filter.exclude_sticky {
            qb.push(" AND NOT c.sticky");
        }

        for clause in &filter.meta {
            if !clause.compare.needs_value() {
                qb.push(" AND ");
                qb.push(clause.compare.as_sql());
                qb.push(" (SELECT 1 FROM item_meta m WHERE m.item_id = c.id AND m.meta_key = ");
                qb.push_bind(clause.key.clone());
                qb.push(")");
                continue;
            }

            let Some(value) = clause.value.as_ref() else {
                // A comparison without a value matches nothing.
                qb.push(" AND FALSE");
                continue;
            };

            qb.push(" AND EXISTS (SELECT 1 FROM item_meta m WHERE m.item_id = c.id AND m.meta_key = ");
            qb.push_bind(clause.key.clone());

            match (clause.compare, clause.value_type) {
                (MetaCompare::Like, _) => {
                    qb.push(" AND m.meta_value ILIKE ");
                    qb.push_bind(like_contains(value));
                }
                (compare, MetaValueType::Numeric) => {
                    let Ok(number) = value.trim().parse::<f64>() else {
                        qb.push(" AND FALSE)");
                        continue;
                    };
                    qb.push(
                        " AND (CASE WHEN m.meta_value ~ '^\\s*-?[0-9]+(\\.[0-9]+)?\\s*$' \
                         THEN trim(m.meta_value)::double precision END) ",
                    );
                    qb.push(compare.as_sql());
                    qb.push(" ");
                    qb.push_bind(number);
                }
                (compare, MetaValueType::Char) => {
                    qb.push(" AND m.meta_value COLLATE \"C\" ");
                    qb.push(compare.as_sql());
                    qb.push(" ");
                    qb.push_bind(value.clone());
                }
            }
            qb.push(")");
        }
    }
}
