//! Slot markup: the client-side placeholder and the per-item content it loads.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::application::ad_slots::AdSlotService;
use crate::application::campaigns::{CampaignService, SponsoredItem};
use crate::application::repos::{ContentRepo, RepoError};
use crate::domain::entities::ItemId;
use crate::domain::slots::SlotDefinition;
use crate::presentation::views::{AdSlotTemplate, SlotCardTemplate, render_fragment, script_json};

/// Renderer name of the built-in card markup.
pub const CARD_RENDERER: &str = "card";

pub trait SlotRenderer: Send + Sync {
    /// Markup for `item` placed in `slot`. An empty string means nothing to show.
    fn render(&self, slot: &SlotDefinition, item: &SponsoredItem) -> String;
}

/// Title, excerpt and sponsor line in a small card.
#[derive(Debug, Default, Clone, Copy)]
pub struct CardRenderer;

impl SlotRenderer for CardRenderer {
    fn render(&self, slot: &SlotDefinition, item: &SponsoredItem) -> String {
        let sponsor_line = match (
            item.campaign_value("tagline", false),
            item.campaign_value("name", false),
        ) {
            (Some(tagline), Some(name)) => format!("{tagline}{name}"),
            _ => String::new(),
        };
        let template = SlotCardTemplate {
            slot: slot.name.clone(),
            title: item.item.title.clone(),
            permalink: item.item.permalink.clone(),
            excerpt: item.item.excerpt.clone(),
            sponsor_line,
            sponsor_url: item.campaign_value("external-url", false),
        };
        render_fragment(&template).unwrap_or_else(|err| {
            warn!(
                target = "sponsorship::slot_content",
                slot = %slot.name,
                item_id = item.item.id,
                error = %err,
                "Card renderer failed"
            );
            String::new()
        })
    }
}

/// Renderers by name. A renderer registered under a slot's own name wins over
/// the one the slot names in its definition.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: HashMap<String, Arc<dyn SlotRenderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in renderers.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(CARD_RENDERER, Arc::new(CardRenderer));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, renderer: Arc<dyn SlotRenderer>) {
        self.renderers.insert(name.into(), renderer);
    }

    pub fn for_slot(&self, slot: &SlotDefinition) -> Option<Arc<dyn SlotRenderer>> {
        self.renderers
            .get(&slot.name)
            .or_else(|| {
                slot.renderer
                    .as_ref()
                    .and_then(|name| self.renderers.get(name))
            })
            .cloned()
    }
}

#[derive(Debug, Error)]
pub enum SlotContentError {
    #[error("item {0} not found")]
    UnknownItem(ItemId),
    #[error("item {item} is not targeted to slot `{slot}`")]
    NotTargeted { item: ItemId, slot: String },
    #[error("no renderer registered for slot `{0}`")]
    NoRenderer(String),
    #[error("renderer produced no content for slot `{0}`")]
    EmptyRender(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct SlotContentService {
    ad_slots: Arc<AdSlotService>,
    campaigns: Arc<CampaignService>,
    content: Arc<dyn ContentRepo>,
    renderers: RendererRegistry,
    /// Path the placeholder script appends an item id to.
    item_endpoint: String,
}

impl SlotContentService {
    pub fn new(
        ad_slots: Arc<AdSlotService>,
        campaigns: Arc<CampaignService>,
        content: Arc<dyn ContentRepo>,
        renderers: RendererRegistry,
        item_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            ad_slots,
            campaigns,
            content,
            renderers,
            item_endpoint: item_endpoint.into(),
        }
    }

    /// Markup for one item in one slot.
    pub async fn render(&self, slot: &str, item_id: ItemId) -> Result<String, SlotContentError> {
        let item = self
            .content
            .find_item(item_id)
            .await?
            .filter(|item| item.status.is_public())
            .ok_or(SlotContentError::UnknownItem(item_id))?;

        let definition = match self.ad_slots.catalog().get(slot) {
            Some(definition) if self.ad_slots.is_targeted(item_id, slot).await? => definition,
            _ => {
                return Err(SlotContentError::NotTargeted {
                    item: item_id,
                    slot: slot.to_string(),
                });
            }
        };

        let renderer = self
            .renderers
            .for_slot(definition)
            .ok_or_else(|| SlotContentError::NoRenderer(slot.to_string()))?;

        let sponsored = self.campaigns.sponsored_item(item).await?;
        let markup = renderer.render(definition, &sponsored);
        if markup.trim().is_empty() {
            return Err(SlotContentError::EmptyRender(slot.to_string()));
        }
        Ok(markup)
    }

    /// Placeholder markup for `slot`, or `None` when nothing is eligible.
    pub async fn placeholder(&self, slot: &str) -> Option<String> {
        let eligible = self.ad_slots.get_eligible(slot, None).await;
        if eligible.is_empty() {
            debug!(
                target = "sponsorship::slot_content",
                slot,
                "No eligible items; omitting placeholder"
            );
            return None;
        }

        let element_id = format!("sponsorship-manager-ad-slot-{slot}");
        let endpoint = format!(
            "{}/{}/items/",
            self.item_endpoint.trim_end_matches('/'),
            slot
        );
        let template = AdSlotTemplate {
            slot: slot.to_string(),
            element_id_json: script_json(&element_id),
            element_id,
            eligible_json: script_json(&eligible),
            endpoint_json: script_json(&endpoint),
        };
        match render_fragment(&template) {
            Ok(markup) => Some(markup),
            Err(err) => {
                warn!(
                    target = "sponsorship::slot_content",
                    slot,
                    error = %err,
                    "Failed to render slot placeholder"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ContentItem;
    use crate::domain::query::ContentQuery;
    use crate::domain::types::ContentStatus;

    struct Blank;

    impl SlotRenderer for Blank {
        fn render(&self, _slot: &SlotDefinition, _item: &SponsoredItem) -> String {
            "  ".to_string()
        }
    }

    fn sponsored() -> SponsoredItem {
        SponsoredItem {
            item: ContentItem {
                id: 42,
                content_type: "post".to_string(),
                title: "Hello".to_string(),
                permalink: "https://news.example/hello".to_string(),
                excerpt: "World".to_string(),
                status: ContentStatus::Published,
                sticky: false,
                published_at: None,
            },
            campaign: None,
            parent: None,
            info: Default::default(),
        }
    }

    #[test]
    fn slot_name_registration_wins_over_named_renderer() {
        let slot = SlotDefinition::new("sidebar", "Sidebar", ContentQuery::default())
            .expect("slot")
            .with_renderer(CARD_RENDERER);
        let mut registry = RendererRegistry::with_builtin();
        assert!(registry.for_slot(&slot).is_some());

        registry.register("sidebar", Arc::new(Blank));
        let renderer = registry.for_slot(&slot).expect("renderer");
        assert_eq!(renderer.render(&slot, &sponsored()).trim(), "");
    }

    #[test]
    fn slot_without_renderer_has_none() {
        let slot = SlotDefinition::new("footer", "Footer", ContentQuery::default()).expect("slot");
        assert!(RendererRegistry::with_builtin().for_slot(&slot).is_none());
    }

    #[test]
    fn card_renders_title_and_link() {
        let slot = SlotDefinition::new("sidebar", "Sidebar", ContentQuery::default()).expect("slot");
        let html = CardRenderer.render(&slot, &sponsored());
        assert!(html.contains("https://news.example/hello"));
        assert!(html.contains("sponsorship-manager-slot--sidebar"));
    }
}
