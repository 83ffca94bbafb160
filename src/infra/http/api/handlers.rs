use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use sponsorship_api_types::{
    EligibleItems, EligibleParams, Envelope, Markup, SavedContent, SlotContent, SlotOption,
    ViewerParams,
};

use crate::application::error::AppError;
use crate::application::manager::ContentSave;
use crate::application::pixel::Viewer;
use crate::domain::entities::{ContentItem, ItemId};
use crate::domain::query::ListingQuery;
use crate::domain::sponsorship::SponsorshipInfo;

use super::error::{SlotApiError, codes};
use super::state::ApiState;

/// Body of the content-saved hook: the item as stored plus the editor's
/// sponsorship fields.
#[derive(Debug, Deserialize)]
pub struct ContentSavedRequest {
    pub item: ContentItem,
    #[serde(default)]
    pub info: SponsorshipInfo,
}

/// -------- Slots --------
pub async fn list_slots(State(state): State<ApiState>) -> impl IntoResponse {
    let options = state
        .manager
        .ad_slots()
        .slot_options()
        .into_iter()
        .map(|(name, label)| SlotOption { name, label })
        .collect::<Vec<_>>();
    Json(Envelope::ok(options))
}

pub async fn slot_item(
    State(state): State<ApiState>,
    Path((slot, raw_item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, SlotApiError> {
    let item_id: ItemId = raw_item_id.trim().parse().map_err(|_| {
        SlotApiError::new(
            StatusCode::NOT_FOUND,
            codes::UNKNOWN_ITEM,
            "Unknown item",
            format!("item id `{raw_item_id}` is not numeric"),
        )
    })?;
    let content = state.manager.slot_content().render(&slot, item_id).await?;
    Ok(Json(Envelope::ok(SlotContent { content })))
}

pub async fn eligible(
    State(state): State<ApiState>,
    Path(slot): Path<String>,
    Query(params): Query<EligibleParams>,
) -> impl IntoResponse {
    let ad_slots = state.manager.ad_slots();
    let ids = if params.nocache {
        ad_slots.get_eligible_fresh(&slot, None).await
    } else {
        ad_slots.get_eligible(&slot, None).await
    };
    Json(Envelope::ok(EligibleItems { slot, ids }))
}

pub async fn placeholder(
    State(state): State<ApiState>,
    Path(slot): Path<String>,
) -> impl IntoResponse {
    let markup = state
        .manager
        .slot_content()
        .placeholder(&slot)
        .await
        .unwrap_or_default();
    Json(Envelope::ok(Markup { markup }))
}

/// -------- Items --------
pub async fn item_pixel(
    State(state): State<ApiState>,
    Path(item_id): Path<ItemId>,
    Query(viewer): Query<ViewerParams>,
) -> Result<impl IntoResponse, AppError> {
    let markup = state
        .manager
        .pixel_for_item(item_id, Viewer::from(viewer))
        .await?
        .unwrap_or_default();
    Ok(Json(Envelope::ok(Markup { markup })))
}

pub async fn item_sponsor(
    State(state): State<ApiState>,
    Path(item_id): Path<ItemId>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state
        .manager
        .campaigns()
        .summary(item_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(Envelope::ok(summary)))
}

/// -------- Host hooks --------
pub async fn content_saved(
    State(state): State<ApiState>,
    Json(request): Json<ContentSavedRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .manager
        .on_content_saved(ContentSave {
            item: request.item,
            info: request.info,
        })
        .await?;
    Ok(Json(Envelope::ok(SavedContent::from(outcome))))
}

pub async fn listing_query(
    State(state): State<ApiState>,
    Json(listing): Json<ListingQuery>,
) -> impl IntoResponse {
    Json(Envelope::ok(state.manager.on_listing_query_built(listing)))
}
