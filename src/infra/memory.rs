//! In-process repositories.
//!
//! Queries are evaluated with [`ContentQuery::matches`], the same rules the
//! SQL builder in `infra::db::content` expresses.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::application::repos::{
    AttachmentsRepo, CampaignsRepo, ContentRepo, ItemMetaRepo, RepoError, VisibilityTermsRepo,
};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::entities::{
    AttachmentId, AttachmentImage, CampaignId, CampaignRecord, ContentItem, ItemId,
};
use crate::domain::query::{ContentQuery, ItemFacts};
use crate::domain::types::VisibilityTerm;

const SOURCE: &str = "infra::memory";

#[derive(Default)]
struct State {
    items: BTreeMap<ItemId, ContentItem>,
    meta: HashMap<ItemId, HashMap<String, String>>,
    campaigns: BTreeMap<CampaignId, CampaignRecord>,
    item_campaigns: HashMap<ItemId, BTreeSet<CampaignId>>,
    attachments: HashMap<(AttachmentId, String), AttachmentImage>,
    terms: HashMap<ItemId, BTreeSet<VisibilityTerm>>,
}

#[derive(Default)]
pub struct MemoryRepositories {
    state: RwLock<State>,
    queries: AtomicUsize,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&self, item: ContentItem) {
        rw_write(&self.state, SOURCE, "insert_item")
            .items
            .insert(item.id, item);
    }

    pub fn insert_campaign(&self, campaign: CampaignRecord) {
        rw_write(&self.state, SOURCE, "insert_campaign")
            .campaigns
            .insert(campaign.id, campaign);
    }

    pub fn insert_attachment(&self, id: AttachmentId, size: &str, image: AttachmentImage) {
        rw_write(&self.state, SOURCE, "insert_attachment")
            .attachments
            .insert((id, size.to_string()), image);
    }

    /// Number of `query_ids` calls served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn select(&self, query: &ContentQuery) -> Vec<ContentItem> {
        let state = rw_read(&self.state, SOURCE, "select");
        let no_meta = HashMap::new();
        let no_campaigns = BTreeSet::new();
        let no_terms = BTreeSet::new();

        let mut matched: Vec<&ContentItem> = state
            .items
            .values()
            .filter(|item| {
                let facts = ItemFacts {
                    item,
                    meta: state.meta.get(&item.id).unwrap_or(&no_meta),
                    campaigns: state.item_campaigns.get(&item.id).unwrap_or(&no_campaigns),
                    terms: state.terms.get(&item.id).unwrap_or(&no_terms),
                };
                query.matches(&facts)
            })
            .collect();

        matched.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        matched.into_iter().take(limit).cloned().collect()
    }
}

#[async_trait]
impl ContentRepo for MemoryRepositories {
    async fn find_item(&self, id: ItemId) -> Result<Option<ContentItem>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "find_item")
            .items
            .get(&id)
            .cloned())
    }

    async fn query_ids(&self, query: &ContentQuery) -> Result<Vec<ItemId>, RepoError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.select(query).into_iter().map(|item| item.id).collect())
    }

    async fn upsert_item(&self, item: &ContentItem) -> Result<(), RepoError> {
        self.insert_item(item.clone());
        Ok(())
    }
}

#[async_trait]
impl ItemMetaRepo for MemoryRepositories {
    async fn get_meta(&self, item: ItemId, key: &str) -> Result<Option<String>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "get_meta")
            .meta
            .get(&item)
            .and_then(|meta| meta.get(key))
            .cloned())
    }

    async fn put_meta(&self, item: ItemId, key: &str, value: &str) -> Result<(), RepoError> {
        rw_write(&self.state, SOURCE, "put_meta")
            .meta
            .entry(item)
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_meta(&self, item: ItemId, key: &str) -> Result<(), RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "delete_meta");
        if let Some(meta) = state.meta.get_mut(&item) {
            meta.remove(key);
            if meta.is_empty() {
                state.meta.remove(&item);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CampaignsRepo for MemoryRepositories {
    async fn find_campaign(&self, id: CampaignId) -> Result<Option<CampaignRecord>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "find_campaign")
            .campaigns
            .get(&id)
            .cloned())
    }

    async fn campaigns_for_item(&self, item: ItemId) -> Result<Vec<CampaignRecord>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "campaigns_for_item");
        let Some(ids) = state.item_campaigns.get(&item) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| state.campaigns.get(id).cloned())
            .collect())
    }

    async fn assign_campaign(
        &self,
        item: ItemId,
        campaign: Option<CampaignId>,
    ) -> Result<(), RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "assign_campaign");
        match campaign {
            Some(campaign) => {
                if !state.campaigns.contains_key(&campaign) {
                    return Err(RepoError::Integrity {
                        message: format!("campaign {campaign} does not exist"),
                    });
                }
                state
                    .item_campaigns
                    .insert(item, BTreeSet::from([campaign]));
            }
            None => {
                state.item_campaigns.remove(&item);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AttachmentsRepo for MemoryRepositories {
    async fn find_image(
        &self,
        id: AttachmentId,
        size: &str,
    ) -> Result<Option<AttachmentImage>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "find_image");
        Ok(state
            .attachments
            .get(&(id, size.to_string()))
            .or_else(|| state.attachments.get(&(id, "full".to_string())))
            .cloned())
    }
}

#[async_trait]
impl VisibilityTermsRepo for MemoryRepositories {
    async fn terms_for_item(&self, item: ItemId) -> Result<BTreeSet<VisibilityTerm>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "terms_for_item")
            .terms
            .get(&item)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_terms(&self, item: ItemId, terms: &[VisibilityTerm]) -> Result<(), RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "set_terms");
        if terms.is_empty() {
            state.terms.remove(&item);
        } else {
            state.terms.insert(item, terms.iter().copied().collect());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::query::MetaClause;
    use crate::domain::types::ContentStatus;

    fn item(id: ItemId, published: time::OffsetDateTime) -> ContentItem {
        ContentItem {
            id,
            content_type: "post".to_string(),
            title: format!("Item {id}"),
            permalink: format!("https://news.example/{id}"),
            excerpt: String::new(),
            status: ContentStatus::Published,
            sticky: false,
            published_at: Some(published),
        }
    }

    #[tokio::test]
    async fn query_orders_newest_first_and_limits() {
        let repos = MemoryRepositories::new();
        repos.insert_item(item(1, datetime!(2024-01-01 0:00 UTC)));
        repos.insert_item(item(2, datetime!(2024-03-01 0:00 UTC)));
        repos.insert_item(item(3, datetime!(2024-02-01 0:00 UTC)));

        let ids = repos
            .query_ids(&ContentQuery {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .expect("query");
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(repos.query_count(), 1);
    }

    #[tokio::test]
    async fn meta_filters_apply() {
        let repos = MemoryRepositories::new();
        repos.insert_item(item(1, datetime!(2024-01-01 0:00 UTC)));
        repos.insert_item(item(2, datetime!(2024-01-02 0:00 UTC)));
        repos.put_meta(1, "flag", "1").await.expect("put");

        let ids = repos
            .query_ids(&ContentQuery {
                meta: vec![MetaClause::exists("flag")],
                ..Default::default()
            })
            .await
            .expect("query");
        assert_eq!(ids, vec![1]);

        repos.delete_meta(1, "flag").await.expect("delete");
        repos.delete_meta(1, "flag").await.expect("idempotent delete");
        assert_eq!(repos.get_meta(1, "flag").await.expect("get"), None);
    }

    #[tokio::test]
    async fn assigning_unknown_campaign_fails() {
        let repos = MemoryRepositories::new();
        let err = repos.assign_campaign(1, Some(99)).await.expect_err("missing");
        assert!(matches!(err, RepoError::Integrity { .. }));
    }
}
