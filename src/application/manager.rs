//! Entry point the host calls into.
//!
//! [`SponsorshipManager`] owns every sponsorship service and exposes the two
//! host events: an item was saved, and a listing query is about to run.

use std::sync::Arc;

use sponsorship_api_types::SavedContent;
use tracing::{debug, info};
use url::Url;

use crate::application::ad_slots::{AdSlotPolicy, AdSlotService};
use crate::application::archiveless;
use crate::application::campaigns::CampaignService;
use crate::application::error::AppError;
use crate::application::pixel::{PixelConfig, TrackingPixel, Viewer};
use crate::application::repos::{
    AttachmentsRepo, CampaignsRepo, ContentRepo, ItemMetaRepo, RepoError, VisibilityTermsRepo,
};
use crate::application::slot_content::{RendererRegistry, SlotContentService};
use crate::application::visibility;
use crate::cache::EligibleCacheStore;
use crate::domain::entities::{ContentItem, ItemId};
use crate::domain::query::ListingQuery;
use crate::domain::slots::SlotCatalog;
use crate::domain::sponsorship::{SPONSORSHIP_INFO_KEY, SponsorshipInfo};
use crate::domain::types::{ContentStatus, VisibilityTerm};

/// An item as the host saved it, with the sponsorship fields from the editor.
#[derive(Debug, Clone)]
pub struct ContentSave {
    pub item: ContentItem,
    pub info: SponsorshipInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub item_id: ItemId,
    pub status: ContentStatus,
    pub targeted_slots: Vec<String>,
    /// `None` when the item's visibility terms were left untouched.
    pub hidden_terms: Option<Vec<VisibilityTerm>>,
}

impl From<SaveOutcome> for SavedContent {
    fn from(outcome: SaveOutcome) -> Self {
        Self {
            item_id: outcome.item_id,
            status: outcome.status.as_str().to_string(),
            targeted_slots: outcome.targeted_slots,
            hidden_terms: outcome
                .hidden_terms
                .unwrap_or_default()
                .into_iter()
                .map(|term| term.as_str().to_string())
                .collect(),
        }
    }
}

/// Stores the sponsorship services need to write to on save.
#[derive(Clone)]
pub struct ManagerStores {
    pub content: Arc<dyn ContentRepo>,
    pub meta: Arc<dyn ItemMetaRepo>,
    pub campaigns: Arc<dyn CampaignsRepo>,
    pub terms: Arc<dyn VisibilityTermsRepo>,
}

/// Deployment settings the manager is assembled from.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub catalog: SlotCatalog,
    pub policy: AdSlotPolicy,
    pub pixel: PixelConfig,
    pub site_url: Url,
    /// Base path of the slot API, used by placeholders to fetch item markup.
    pub slot_endpoint: String,
}

/// Every adapter the manager depends on.
#[derive(Clone)]
pub struct ManagerDeps {
    pub content: Arc<dyn ContentRepo>,
    pub meta: Arc<dyn ItemMetaRepo>,
    pub campaigns: Arc<dyn CampaignsRepo>,
    pub attachments: Arc<dyn AttachmentsRepo>,
    pub terms: Arc<dyn VisibilityTermsRepo>,
    pub cache: Arc<dyn EligibleCacheStore>,
}

pub struct SponsorshipManager {
    stores: ManagerStores,
    ad_slots: Arc<AdSlotService>,
    campaigns: Arc<CampaignService>,
    pixel: Arc<TrackingPixel>,
    slot_content: Arc<SlotContentService>,
}

impl SponsorshipManager {
    pub fn new(
        stores: ManagerStores,
        ad_slots: Arc<AdSlotService>,
        campaigns: Arc<CampaignService>,
        pixel: Arc<TrackingPixel>,
        slot_content: Arc<SlotContentService>,
    ) -> Self {
        Self {
            stores,
            ad_slots,
            campaigns,
            pixel,
            slot_content,
        }
    }

    /// Wire every service from settings and adapters.
    pub fn build(config: ManagerConfig, deps: ManagerDeps, renderers: RendererRegistry) -> Self {
        let ad_slots = Arc::new(AdSlotService::new(
            Arc::new(config.catalog),
            config.policy,
            deps.content.clone(),
            deps.meta.clone(),
            deps.cache,
        ));
        let campaigns = Arc::new(CampaignService::new(
            deps.campaigns.clone(),
            deps.attachments,
            deps.meta.clone(),
            config.site_url,
        ));
        let pixel = Arc::new(TrackingPixel::new(config.pixel));
        let slot_content = Arc::new(SlotContentService::new(
            ad_slots.clone(),
            campaigns.clone(),
            deps.content.clone(),
            renderers,
            config.slot_endpoint,
        ));
        let stores = ManagerStores {
            content: deps.content,
            meta: deps.meta,
            campaigns: deps.campaigns,
            terms: deps.terms,
        };
        Self::new(stores, ad_slots, campaigns, pixel, slot_content)
    }

    pub fn ad_slots(&self) -> &Arc<AdSlotService> {
        &self.ad_slots
    }

    pub fn campaigns(&self) -> &Arc<CampaignService> {
        &self.campaigns
    }

    pub fn pixel(&self) -> &Arc<TrackingPixel> {
        &self.pixel
    }

    pub fn slot_content(&self) -> &Arc<SlotContentService> {
        &self.slot_content
    }

    pub fn enabled_content_types(&self) -> &[String] {
        &self.ad_slots.policy().enabled_content_types
    }

    /// Apply every sponsorship side effect of a save: archiveless status,
    /// stored sponsorship fields, campaign assignment, slot targeting and
    /// hidden terms.
    ///
    /// Items of content types without sponsorship support are returned as-is.
    pub async fn on_content_saved(&self, save: ContentSave) -> Result<SaveOutcome, AppError> {
        let ContentSave { item, info } = save;

        if !self.enabled_content_types().contains(&item.content_type) {
            debug!(
                target = "sponsorship::manager",
                item_id = item.id,
                content_type = %item.content_type,
                "Content type has no sponsorship support; skipping"
            );
            return Ok(SaveOutcome {
                item_id: item.id,
                status: item.status,
                targeted_slots: Vec::new(),
                hidden_terms: None,
            });
        }

        if let Some(campaign) = info.campaign {
            if self.stores.campaigns.find_campaign(campaign).await?.is_none() {
                return Err(RepoError::InvalidInput {
                    message: format!("campaign {campaign} does not exist"),
                }
                .into());
            }
        }

        let status = archiveless::status_for_write(item.status, &info);
        let stored = ContentItem {
            status,
            ..item.clone()
        };
        self.stores.content.upsert_item(&stored).await?;

        let encoded = serde_json::to_string(&info)
            .map_err(|err| AppError::unexpected(format!("encode sponsorship info: {err}")))?;
        self.stores
            .meta
            .put_meta(item.id, SPONSORSHIP_INFO_KEY, &encoded)
            .await?;

        self.stores
            .campaigns
            .assign_campaign(item.id, info.campaign)
            .await?;

        let targeted_slots = self.ad_slots.set_targeting(item.id, &info.ad_slots).await?;

        let hidden_terms = visibility::hidden_terms_on_save(
            &item,
            status,
            &info,
            info.campaign.is_some(),
            self.enabled_content_types(),
        );
        if let Some(terms) = &hidden_terms {
            self.stores.terms.set_terms(item.id, terms).await?;
        }

        info!(
            target = "sponsorship::manager",
            item_id = item.id,
            status = status.as_str(),
            targeted = targeted_slots.len(),
            "Processed content save"
        );

        Ok(SaveOutcome {
            item_id: item.id,
            status,
            targeted_slots,
            hidden_terms,
        })
    }

    /// Adjust a listing before it runs: drop archiveless items where they do
    /// not belong and exclude hidden sponsored items.
    pub fn on_listing_query_built(&self, mut listing: ListingQuery) -> ListingQuery {
        archiveless::filter_listing(&mut listing);
        visibility::exclude_hidden(&mut listing);
        listing
    }

    /// The item's tracking pixel script for `viewer`, if one should fire.
    pub async fn pixel_for_item(
        &self,
        item_id: ItemId,
        viewer: Viewer,
    ) -> Result<Option<String>, AppError> {
        if self.stores.content.find_item(item_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        let info = self.campaigns.sponsorship_info(item_id).await?;
        Ok(self.pixel.render(info.tracking_pixel(), viewer))
    }

    /// `content` with the item's tracking pixel appended.
    pub async fn insert_tracking_pixel(
        &self,
        item_id: ItemId,
        content: &str,
        viewer: Viewer,
    ) -> Result<String, AppError> {
        let info = self.campaigns.sponsorship_info(item_id).await?;
        Ok(self
            .pixel
            .append_to_content(content, info.tracking_pixel(), viewer))
    }
}
