//! Wire types for the sponsorship manager HTTP API.
//!
//! Every endpoint answers with an [`Envelope`]: `{"success": true, "data": ...}`
//! on success or `{"success": false, "message": "..."}` on failure.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Rendered slot content for a single targeted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleItems {
    pub slot: String,
    pub ids: Vec<i64>,
}

/// HTML fragment intended to be embedded verbatim by the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Markup {
    pub markup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorSummary {
    pub campaign_id: i64,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<i64>,
    pub tagline: String,
    pub external_url: Option<String>,
    pub hub_url: Option<String>,
    pub logo_url: Option<String>,
    pub description: Option<String>,
}

/// Result of the content-saved hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedContent {
    pub item_id: i64,
    pub status: String,
    pub targeted_slots: Vec<String>,
    pub hidden_terms: Vec<String>,
}

/// Viewer flags supplied by the host when requesting a tracking pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerParams {
    #[serde(deserialize_with = "query_flag")]
    pub admin: bool,
    #[serde(deserialize_with = "query_flag")]
    pub preview: bool,
    #[serde(deserialize_with = "query_flag")]
    pub logged_in: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibleParams {
    #[serde(deserialize_with = "query_flag")]
    pub nocache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotOption {
    pub name: String,
    pub label: String,
}

/// Query-string flags arrive as `1`/`0`, `true`/`false` or bare JSON booleans.
fn query_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(value) => value,
        Raw::Text(value) => matches!(value.trim(), "1" | "true" | "yes" | "on"),
    })
}
