pub mod error;
pub mod handlers;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    routing::{get, post},
};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/slots", get(handlers::list_slots))
        .route(
            "/api/v1/slots/{slot}/items/{item_id}",
            get(handlers::slot_item),
        )
        .route("/api/v1/slots/{slot}/eligible", get(handlers::eligible))
        .route(
            "/api/v1/slots/{slot}/placeholder",
            get(handlers::placeholder),
        )
        .route("/api/v1/items/{item_id}/pixel", get(handlers::item_pixel))
        .route(
            "/api/v1/items/{item_id}/sponsor",
            get(handlers::item_sponsor),
        )
        .route(
            "/api/v1/hooks/content-saved",
            post(handlers::content_saved),
        )
        .route(
            "/api/v1/hooks/listing-query",
            post(handlers::listing_query),
        )
        .with_state(state)
}
