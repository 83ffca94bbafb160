use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{ContentRepo, ItemMetaRepo, RepoError},
    domain::entities::{ContentItem, ItemId},
    domain::query::ContentQuery,
    domain::types::ContentStatus,
};

use super::{PostgresRepositories, map_sqlx_error};

const CONTENT_COLUMNS: &str =
    "c.id, c.content_type, c.title, c.permalink, c.excerpt, c.status, c.sticky, c.published_at";

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: i64,
    content_type: String,
    title: String,
    permalink: String,
    excerpt: String,
    status: ContentStatus,
    sticky: bool,
    published_at: Option<OffsetDateTime>,
}

impl From<ContentRow> for ContentItem {
    fn from(row: ContentRow) -> Self {
        Self {
            id: row.id,
            content_type: row.content_type,
            title: row.title,
            permalink: row.permalink,
            excerpt: row.excerpt,
            status: row.status,
            sticky: row.sticky,
            published_at: row.published_at,
        }
    }
}

impl PostgresRepositories {
    fn select_content<'q>(select: &str, filter: &ContentQuery) -> QueryBuilder<'q, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(select);
        qb.push(" FROM content_items c WHERE TRUE");
        Self::apply_content_filter(&mut qb, filter);
        qb.push(" ORDER BY c.published_at DESC NULLS LAST, c.id DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }
        qb
    }
}

#[async_trait]
impl ContentRepo for PostgresRepositories {
    async fn find_item(&self, id: ItemId) -> Result<Option<ContentItem>, RepoError> {
        let sql = format!("SELECT {CONTENT_COLUMNS} FROM content_items c WHERE c.id = $1");
        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(ContentItem::from))
    }

    async fn query_ids(&self, query: &ContentQuery) -> Result<Vec<ItemId>, RepoError> {
        let mut qb = Self::select_content("c.id", query);
        qb.build_query_scalar::<i64>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn upsert_item(&self, item: &ContentItem) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO content_items \
                 (id, content_type, title, permalink, excerpt, status, sticky, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
                 content_type = EXCLUDED.content_type, \
                 title = EXCLUDED.title, \
                 permalink = EXCLUDED.permalink, \
                 excerpt = EXCLUDED.excerpt, \
                 status = EXCLUDED.status, \
                 sticky = EXCLUDED.sticky, \
                 published_at = EXCLUDED.published_at",
        )
        .bind(item.id)
        .bind(&item.content_type)
        .bind(&item.title)
        .bind(&item.permalink)
        .bind(&item.excerpt)
        .bind(item.status)
        .bind(item.sticky)
        .bind(item.published_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl ItemMetaRepo for PostgresRepositories {
    async fn get_meta(&self, item: ItemId, key: &str) -> Result<Option<String>, RepoError> {
        sqlx::query_scalar::<_, String>(
            "SELECT meta_value FROM item_meta WHERE item_id = $1 AND meta_key = $2",
        )
        .bind(item)
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn put_meta(&self, item: ItemId, key: &str, value: &str) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO item_meta (item_id, meta_key, meta_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (item_id, meta_key) DO UPDATE SET meta_value = EXCLUDED.meta_value
            "#,
        )
        .bind(item)
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_meta(&self, item: ItemId, key: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM item_meta WHERE item_id = $1 AND meta_key = $2")
            .bind(item)
            .bind(key)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
