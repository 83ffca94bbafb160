//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::ContentStatus;

pub type ItemId = i64;
pub type CampaignId = i64;
pub type AttachmentId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    pub content_type: String,
    pub title: String,
    pub permalink: String,
    #[serde(default)]
    pub excerpt: String,
    pub status: ContentStatus,
    #[serde(default)]
    pub sticky: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

/// A sponsorship campaign term; campaigns nest at most one level in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: CampaignId,
    pub parent_id: Option<CampaignId>,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub display: CampaignDisplay,
}

pub const DEFAULT_TAGLINE: &str = "Sponsored by ";

/// Display metadata editors attach to a campaign term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignDisplay {
    pub logo: Option<AttachmentId>,
    #[serde(rename = "featured-image")]
    pub featured_image: Option<AttachmentId>,
    #[serde(rename = "external-url")]
    pub external_url: Option<String>,
    pub tagline: String,
    #[serde(rename = "richdescription")]
    pub rich_description: Option<String>,
}

impl Default for CampaignDisplay {
    fn default() -> Self {
        Self {
            logo: None,
            featured_image: None,
            external_url: None,
            tagline: DEFAULT_TAGLINE.to_string(),
            rich_description: None,
        }
    }
}

/// Which campaign image to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignImage {
    Logo,
    FeaturedImage,
}

impl CampaignDisplay {
    pub fn image(&self, which: CampaignImage) -> Option<AttachmentId> {
        match which {
            CampaignImage::Logo => self.logo,
            CampaignImage::FeaturedImage => self.featured_image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}
