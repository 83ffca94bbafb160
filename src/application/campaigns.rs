//! Campaign lookup for sponsored items.

use std::sync::Arc;

use sponsorship_api_types::SponsorSummary;
use tracing::warn;
use url::Url;

use crate::application::repos::{AttachmentsRepo, CampaignsRepo, ItemMetaRepo, RepoError};
use crate::domain::entities::{
    AttachmentImage, CampaignImage, CampaignRecord, ContentItem, ItemId,
};
use crate::domain::sponsorship::{SPONSORSHIP_INFO_KEY, SponsorshipInfo};

/// Image size used when the caller does not ask for one.
pub const DEFAULT_IMAGE_SIZE: &str = "full";

/// A content item bundled with its sponsorship context, for templates.
#[derive(Debug, Clone, PartialEq)]
pub struct SponsoredItem {
    pub item: ContentItem,
    pub campaign: Option<CampaignRecord>,
    pub parent: Option<CampaignRecord>,
    pub info: SponsorshipInfo,
}

impl SponsoredItem {
    pub fn is_sponsored(&self) -> bool {
        self.campaign.is_some()
    }

    /// A campaign field by its editor-facing key, read from the campaign or,
    /// with `parent`, from its parent campaign.
    ///
    /// Image keys (`logo`, `featured-image`) yield the attachment id; resolve
    /// URLs through [`CampaignService::image`].
    pub fn campaign_value(&self, key: &str, parent: bool) -> Option<String> {
        let campaign = if parent {
            self.parent.as_ref()
        } else {
            self.campaign.as_ref()
        }?;
        let display = &campaign.display;
        match key {
            "id" => Some(campaign.id.to_string()),
            "name" => Some(campaign.name.clone()),
            "slug" => Some(campaign.slug.clone()),
            "description" => campaign.description.clone(),
            "tagline" => Some(display.tagline.clone()),
            "external-url" => display.external_url.clone(),
            "richdescription" => display.rich_description.clone(),
            "logo" => display.logo.map(|id| id.to_string()),
            "featured-image" => display.featured_image.map(|id| id.to_string()),
            _ => None,
        }
    }
}

pub struct CampaignService {
    campaigns: Arc<dyn CampaignsRepo>,
    attachments: Arc<dyn AttachmentsRepo>,
    meta: Arc<dyn ItemMetaRepo>,
    site_url: Url,
}

impl CampaignService {
    pub fn new(
        campaigns: Arc<dyn CampaignsRepo>,
        attachments: Arc<dyn AttachmentsRepo>,
        meta: Arc<dyn ItemMetaRepo>,
        site_url: Url,
    ) -> Self {
        Self {
            campaigns,
            attachments,
            meta,
            site_url,
        }
    }

    /// The item's sponsoring campaign: the first campaign assigned to it.
    pub async fn sponsor(&self, item: ItemId) -> Result<Option<CampaignRecord>, RepoError> {
        Ok(self.campaigns.campaigns_for_item(item).await?.into_iter().next())
    }

    pub async fn parent(
        &self,
        campaign: &CampaignRecord,
    ) -> Result<Option<CampaignRecord>, RepoError> {
        match campaign.parent_id {
            Some(parent) => self.campaigns.find_campaign(parent).await,
            None => Ok(None),
        }
    }

    /// Stored sponsorship fields for an item. A missing or malformed blob reads
    /// as empty.
    pub async fn sponsorship_info(&self, item: ItemId) -> Result<SponsorshipInfo, RepoError> {
        let Some(raw) = self.meta.get_meta(item, SPONSORSHIP_INFO_KEY).await? else {
            return Ok(SponsorshipInfo::default());
        };
        match serde_json::from_str(&raw) {
            Ok(info) => Ok(info),
            Err(err) => {
                warn!(
                    target = "sponsorship::campaigns",
                    item_id = item,
                    error = %err,
                    "Ignoring malformed sponsorship info"
                );
                Ok(SponsorshipInfo::default())
            }
        }
    }

    pub async fn sponsored_item(&self, item: ContentItem) -> Result<SponsoredItem, RepoError> {
        let campaign = self.sponsor(item.id).await?;
        let parent = match &campaign {
            Some(campaign) => self.parent(campaign).await?,
            None => None,
        };
        let info = self.sponsorship_info(item.id).await?;
        Ok(SponsoredItem {
            item,
            campaign,
            parent,
            info,
        })
    }

    pub async fn image(
        &self,
        campaign: &CampaignRecord,
        which: CampaignImage,
        size: Option<&str>,
    ) -> Result<Option<AttachmentImage>, RepoError> {
        let Some(attachment) = campaign.display.image(which) else {
            return Ok(None);
        };
        self.attachments
            .find_image(attachment, size.unwrap_or(DEFAULT_IMAGE_SIZE))
            .await
    }

    pub fn external_url<'a>(&self, campaign: &'a CampaignRecord) -> Option<&'a str> {
        campaign
            .display
            .external_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// The campaign's hub page on this site, `<site>/sponsor/<slug>/`.
    pub fn hub_url(&self, campaign: &CampaignRecord) -> Option<String> {
        if campaign.slug.is_empty() {
            return None;
        }
        self.site_url
            .join(&format!("sponsor/{}/", campaign.slug))
            .ok()
            .map(String::from)
    }

    /// Sponsor details for an item, or `None` when it is not sponsored.
    pub async fn summary(&self, item: ItemId) -> Result<Option<SponsorSummary>, RepoError> {
        let Some(campaign) = self.sponsor(item).await? else {
            return Ok(None);
        };
        let logo_url = self
            .image(&campaign, CampaignImage::Logo, None)
            .await?
            .map(|image| image.url);
        Ok(Some(SponsorSummary {
            campaign_id: campaign.id,
            name: campaign.name.clone(),
            slug: campaign.slug.clone(),
            parent_id: campaign.parent_id,
            tagline: campaign.display.tagline.clone(),
            external_url: self.external_url(&campaign).map(str::to_string),
            hub_url: self.hub_url(&campaign),
            logo_url,
            description: campaign
                .display
                .rich_description
                .clone()
                .or_else(|| campaign.description.clone()),
        }))
    }
}
