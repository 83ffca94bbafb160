//! Repository traits describing persistence adapters.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    AttachmentId, AttachmentImage, CampaignId, CampaignRecord, ContentItem, ItemId,
};
use crate::domain::query::ContentQuery;
use crate::domain::types::VisibilityTerm;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn find_item(&self, id: ItemId) -> Result<Option<ContentItem>, RepoError>;

    /// Ids of items matching `query`, newest first.
    async fn query_ids(&self, query: &ContentQuery) -> Result<Vec<ItemId>, RepoError>;

    /// Insert or replace the mirrored copy of a host item.
    async fn upsert_item(&self, item: &ContentItem) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ItemMetaRepo: Send + Sync {
    async fn get_meta(&self, item: ItemId, key: &str) -> Result<Option<String>, RepoError>;

    async fn put_meta(&self, item: ItemId, key: &str, value: &str) -> Result<(), RepoError>;

    /// Removing a key that does not exist is not an error.
    async fn delete_meta(&self, item: ItemId, key: &str) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CampaignsRepo: Send + Sync {
    async fn find_campaign(&self, id: CampaignId) -> Result<Option<CampaignRecord>, RepoError>;

    /// Campaigns assigned to an item, lowest id first.
    async fn campaigns_for_item(&self, item: ItemId) -> Result<Vec<CampaignRecord>, RepoError>;

    /// Replace the item's campaign assignment; `None` clears it.
    async fn assign_campaign(
        &self,
        item: ItemId,
        campaign: Option<CampaignId>,
    ) -> Result<(), RepoError>;
}

#[async_trait]
pub trait AttachmentsRepo: Send + Sync {
    async fn find_image(
        &self,
        id: AttachmentId,
        size: &str,
    ) -> Result<Option<AttachmentImage>, RepoError>;
}

#[async_trait]
pub trait VisibilityTermsRepo: Send + Sync {
    async fn terms_for_item(&self, item: ItemId) -> Result<BTreeSet<VisibilityTerm>, RepoError>;

    /// Replace every visibility term on the item with `terms`.
    async fn set_terms(&self, item: ItemId, terms: &[VisibilityTerm]) -> Result<(), RepoError>;
}
