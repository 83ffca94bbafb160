use askama::{Error as AskamaError, Template};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

/// Render an HTML fragment meant to be embedded in a host page.
pub fn render_fragment<T: Template>(template: &T) -> Result<String, TemplateRenderError> {
    template.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_fragment",
            "Template rendering failed",
            err,
        )
    })
}

/// JSON literal safe to place inside an inline `<script>` block.
pub fn script_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

#[derive(Template)]
#[template(path = "pixel.html")]
pub struct PixelScriptTemplate {
    pub url_json: String,
}

/// Client-side placeholder that fills itself from one random eligible item.
#[derive(Template)]
#[template(path = "ad_slot.html")]
pub struct AdSlotTemplate {
    pub slot: String,
    pub element_id: String,
    pub element_id_json: String,
    pub eligible_json: String,
    pub endpoint_json: String,
}

#[derive(Template)]
#[template(path = "slot_card.html")]
pub struct SlotCardTemplate {
    pub slot: String,
    pub title: String,
    pub permalink: String,
    pub excerpt: String,
    /// Tagline followed by sponsor name; empty for unsponsored items.
    pub sponsor_line: String,
    pub sponsor_url: Option<String>,
}
