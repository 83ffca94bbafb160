//! Per-item sponsorship metadata.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::entities::CampaignId;

/// Metadata key the sponsorship blob is stored under.
pub const SPONSORSHIP_INFO_KEY: &str = "sponsorship-info";

/// Metadata key prefix marking an item as targeted to an ad slot.
pub const TARGETING_KEY_PREFIX: &str = "sponsorship_manager_targeted_to_";

pub fn targeting_key(slot: &str) -> String {
    format!("{TARGETING_KEY_PREFIX}{slot}")
}

/// Editor-supplied sponsorship fields for a content item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SponsorshipInfo {
    #[serde(rename = "sponsorship-campaign")]
    pub campaign: Option<CampaignId>,
    #[serde(rename = "dfp-tracking-pixel")]
    pub tracking_pixel: Option<String>,
    #[serde(rename = "hide-from-recent-posts", deserialize_with = "flag")]
    pub hide_from_recent_posts: bool,
    #[serde(rename = "hide-from-feeds", deserialize_with = "flag")]
    pub hide_from_feeds: bool,
    #[serde(deserialize_with = "flag")]
    pub archiveless: bool,
    #[serde(rename = "ad_slot")]
    pub ad_slots: Vec<String>,
}

impl SponsorshipInfo {
    pub fn tracking_pixel(&self) -> Option<&str> {
        self.tracking_pixel
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Checkbox values arrive as booleans, numbers or the strings `"1"`/`""`.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(value) => value,
        Raw::Int(value) => value == 1,
        Raw::Text(value) => value.trim() == "1",
        Raw::Null(()) => false,
    })
}
