use async_trait::async_trait;
use sqlx::types::Json;

use crate::{
    application::repos::{AttachmentsRepo, CampaignsRepo, RepoError},
    domain::entities::{
        AttachmentId, AttachmentImage, CampaignDisplay, CampaignId, CampaignRecord, ItemId,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: i64,
    parent_id: Option<i64>,
    slug: String,
    name: String,
    description: Option<String>,
    display: Json<CampaignDisplay>,
}

impl From<CampaignRow> for CampaignRecord {
    fn from(row: CampaignRow) -> Self {
        Self {
            id: row.id,
            parent_id: row.parent_id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            display: row.display.0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    url: String,
    width: i32,
    height: i32,
}

impl From<AttachmentRow> for AttachmentImage {
    fn from(row: AttachmentRow) -> Self {
        Self {
            url: row.url,
            width: u32::try_from(row.width).unwrap_or_default(),
            height: u32::try_from(row.height).unwrap_or_default(),
        }
    }
}

#[async_trait]
impl CampaignsRepo for PostgresRepositories {
    async fn find_campaign(&self, id: CampaignId) -> Result<Option<CampaignRecord>, RepoError> {
        let row = sqlx::query_as::<_, CampaignRow>(
            "SELECT id, parent_id, slug, name, description, display FROM campaigns WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(CampaignRecord::from))
    }

    async fn campaigns_for_item(&self, item: ItemId) -> Result<Vec<CampaignRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT c.id, c.parent_id, c.slug, c.name, c.description, c.display
            FROM campaigns c
            INNER JOIN item_campaigns ic ON ic.campaign_id = c.id
            WHERE ic.item_id = $1
            ORDER BY c.id
            "#,
        )
        .bind(item)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(CampaignRecord::from).collect())
    }

    async fn assign_campaign(
        &self,
        item: ItemId,
        campaign: Option<CampaignId>,
    ) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM item_campaigns WHERE item_id = $1")
            .bind(item)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if let Some(campaign) = campaign {
            sqlx::query("INSERT INTO item_campaigns (item_id, campaign_id) VALUES ($1, $2)")
                .bind(item)
                .bind(campaign)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl AttachmentsRepo for PostgresRepositories {
    async fn find_image(
        &self,
        id: AttachmentId,
        size: &str,
    ) -> Result<Option<AttachmentImage>, RepoError> {
        // Fall back to the original upload when the size was never generated.
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT url, width, height
            FROM attachments
            WHERE id = $1 AND size IN ($2, 'full')
            ORDER BY (size = $2) DESC
            LIMIT 1
            "#,
        )
        .bind(id)
        .bind(size)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(AttachmentImage::from))
    }
}
