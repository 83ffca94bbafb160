use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tower::ServiceExt;
use url::Url;

use sponsorship_manager::application::ad_slots::AdSlotPolicy;
use sponsorship_manager::application::manager::{ManagerConfig, ManagerDeps, SponsorshipManager};
use sponsorship_manager::application::pixel::PixelConfig;
use sponsorship_manager::application::slot_content::RendererRegistry;
use sponsorship_manager::cache::{CacheConfig, ManualClock, MemoryEligibleStore};
use sponsorship_manager::config::SLOT_API_PATH;
use sponsorship_manager::domain::entities::{CampaignDisplay, CampaignRecord};
use sponsorship_manager::domain::query::ContentQuery;
use sponsorship_manager::domain::slots::{SlotCatalog, SlotDefinition};
use sponsorship_manager::infra::http::{ApiState, REQUEST_ID_HEADER, RequestContext, build_router};
use sponsorship_manager::infra::memory::MemoryRepositories;

const CAMPAIGN_ID: i64 = 7;

fn build_app() -> Router {
    let sidebar = SlotDefinition::new(
        "sidebar",
        "Sidebar",
        ContentQuery {
            content_types: vec!["post".to_string()],
            ..Default::default()
        },
    )
    .expect("sidebar slot")
    .with_renderer("card");
    let footer = SlotDefinition::new("footer", "", ContentQuery::default()).expect("footer slot");
    let catalog = SlotCatalog::new(vec![sidebar, footer]).expect("catalog");

    let repos = Arc::new(MemoryRepositories::new());
    repos.insert_campaign(CampaignRecord {
        id: CAMPAIGN_ID,
        parent_id: None,
        slug: "acme".to_string(),
        name: "Acme".to_string(),
        description: Some("Makers of fine anvils".to_string()),
        display: CampaignDisplay {
            external_url: Some("https://acme.example/".to_string()),
            ..Default::default()
        },
    });

    let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
    let cache = Arc::new(MemoryEligibleStore::new(&CacheConfig::default(), clock));

    let config = ManagerConfig {
        catalog,
        policy: AdSlotPolicy::default(),
        pixel: PixelConfig::default(),
        site_url: Url::parse("https://news.example/").expect("site url"),
        slot_endpoint: SLOT_API_PATH.to_string(),
    };
    let deps = ManagerDeps {
        content: repos.clone(),
        meta: repos.clone(),
        campaigns: repos.clone(),
        attachments: repos.clone(),
        terms: repos,
        cache,
    };
    let manager = SponsorshipManager::build(config, deps, RendererRegistry::with_builtin());

    build_router(ApiState::new(Arc::new(manager), None))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

async fn save(app: &Router, id: i64, info: Value) -> Value {
    let request = json!({
        "item": {
            "id": id,
            "content_type": "post",
            "title": format!("Sponsored story {id}"),
            "permalink": format!("https://news.example/{id}/"),
            "excerpt": "A word from our sponsor",
            "status": "published"
        },
        "info": info
    });
    let (status, body) = send(app, post_json("/api/v1/hooks/content-saved", &request)).await;
    assert_eq!(status, StatusCode::OK, "save failed: {body}");
    body
}

#[tokio::test]
async fn targeted_item_renders_in_slot() {
    let app = build_app();
    let saved = save(
        &app,
        42,
        json!({"sponsorship-campaign": CAMPAIGN_ID, "ad_slot": ["sidebar"]}),
    )
    .await;
    assert_eq!(saved["data"]["targeted_slots"], json!(["sidebar"]));
    assert_eq!(saved["data"]["status"], "published");

    let (status, body) = send(&app, get("/api/v1/slots/sidebar/items/42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let content = body["data"]["content"].as_str().expect("content");
    assert!(content.contains("Sponsored story 42"));
    assert!(content.contains("Acme"));
}

#[tokio::test]
async fn slot_item_failures_use_error_envelope() {
    let app = build_app();
    save(&app, 42, json!({"ad_slot": ["sidebar"]})).await;
    save(&app, 43, json!({"ad_slot": ["footer"]})).await;

    let (status, body) = send(&app, get("/api/v1/slots/sidebar/items/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"success": false, "message": "Unknown item"}));

    let (status, body) = send(&app, get("/api/v1/slots/footer/items/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({"success": false, "message": "Item is not targeted to this slot"})
    );

    let (status, body) = send(&app, get("/api/v1/slots/footer/items/43")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({"success": false, "message": "No renderer registered for this slot"})
    );

    let (status, body) = send(&app, get("/api/v1/slots/sidebar/items/abc")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"success": false, "message": "Unknown item"}));

    let (status, body) = send(&app, get("/api/v1/slots/billboard/items/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn eligible_lists_targeted_items() {
    let app = build_app();
    save(&app, 42, json!({"ad_slot": ["sidebar"]})).await;

    let (status, body) = send(&app, get("/api/v1/slots/sidebar/eligible")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"slot": "sidebar", "ids": [42]}));

    save(&app, 43, json!({"ad_slot": ["sidebar"]})).await;

    // Still served from cache until a fresh read is requested.
    let (_, body) = send(&app, get("/api/v1/slots/sidebar/eligible")).await;
    assert_eq!(body["data"]["ids"], json!([42]));

    let (_, body) = send(&app, get("/api/v1/slots/sidebar/eligible?nocache=1")).await;
    assert_eq!(body["data"]["ids"], json!([43, 42]));

    let (_, body) = send(&app, get("/api/v1/slots/sidebar/eligible")).await;
    assert_eq!(body["data"]["ids"], json!([43, 42]));

    let (status, body) = send(&app, get("/api/v1/slots/billboard/eligible")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ids"], json!([]));
}

#[tokio::test]
async fn placeholder_is_empty_without_eligible_items() {
    let app = build_app();

    let (status, body) = send(&app, get("/api/v1/slots/footer/placeholder")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["markup"], "");

    save(&app, 42, json!({"ad_slot": ["sidebar"]})).await;
    let (_, body) = send(&app, get("/api/v1/slots/sidebar/placeholder")).await;
    let markup = body["data"]["markup"].as_str().expect("markup");
    assert!(markup.contains("sponsorship-manager-ad-slot-sidebar"));
    assert!(markup.contains("[42]"));
}

#[tokio::test]
async fn pixel_respects_viewer() {
    let app = build_app();
    save(
        &app,
        42,
        json!({"dfp-tracking-pixel": "https://ads.example/pixel?id=42&c=1"}),
    )
    .await;
    save(&app, 44, json!({})).await;

    let (status, body) = send(&app, get("/api/v1/items/42/pixel")).await;
    assert_eq!(status, StatusCode::OK);
    let markup = body["data"]["markup"].as_str().expect("markup");
    assert!(markup.contains("https://ads.example/pixel?id=42&c="));
    assert!(!markup.contains("c=1\""));

    for query in ["admin=1", "preview=true", "logged_in=1"] {
        let (_, body) = send(&app, get(&format!("/api/v1/items/42/pixel?{query}"))).await;
        assert_eq!(body["data"]["markup"], "", "pixel fired for {query}");
    }

    let (_, body) = send(&app, get("/api/v1/items/44/pixel")).await;
    assert_eq!(body["data"]["markup"], "");

    let (status, body) = send(&app, get("/api/v1/items/999/pixel")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn sponsor_summary_for_sponsored_items_only() {
    let app = build_app();
    save(&app, 42, json!({"sponsorship-campaign": CAMPAIGN_ID})).await;
    save(&app, 44, json!({})).await;

    let (status, body) = send(&app, get("/api/v1/items/42/sponsor")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Acme");
    assert_eq!(body["data"]["tagline"], "Sponsored by ");
    assert_eq!(body["data"]["external_url"], "https://acme.example/");
    assert_eq!(body["data"]["hub_url"], "https://news.example/sponsor/acme/");
    assert_eq!(body["data"]["description"], "Makers of fine anvils");

    let (status, body) = send(&app, get("/api/v1/items/44/sponsor")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn content_saved_applies_archiveless_and_hidden_terms() {
    let app = build_app();
    let saved = save(
        &app,
        42,
        json!({
            "sponsorship-campaign": CAMPAIGN_ID,
            "archiveless": "1",
            "hide-from-recent-posts": "1",
            "hide-from-feeds": "0",
            "ad_slot": ["sidebar", "billboard"]
        }),
    )
    .await;

    assert_eq!(
        saved["data"],
        json!({
            "item_id": 42,
            "status": "archiveless",
            "targeted_slots": ["sidebar"],
            "hidden_terms": ["_hidden_from_loop"]
        })
    );

    // Archiveless items still fill slots.
    let (_, body) = send(&app, get("/api/v1/slots/sidebar/eligible")).await;
    assert_eq!(body["data"]["ids"], json!([42]));
}

#[tokio::test]
async fn content_saved_rejects_unknown_campaign() {
    let app = build_app();
    let request = json!({
        "item": {
            "id": 42,
            "content_type": "post",
            "title": "Sponsored",
            "permalink": "https://news.example/42/",
            "status": "published"
        },
        "info": {"sponsorship-campaign": 404}
    });
    let (status, body) = send(&app, post_json("/api/v1/hooks/content-saved", &request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn listing_query_hook_rewrites_main_listing() {
    let app = build_app();
    let listing = json!({
        "context": {"main": true, "home": true},
        "query": {"statuses": ["published", "archiveless"]}
    });

    let (status, body) = send(&app, post_json("/api/v1/hooks/listing-query", &listing)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["query"]["statuses"], json!(["published"]));
    assert_eq!(
        body["data"]["query"]["exclude_terms"],
        json!(["_hidden_from_loop"])
    );

    let widget = json!({
        "context": {"main": false},
        "query": {"statuses": ["published", "archiveless"]}
    });
    let (_, body) = send(&app, post_json("/api/v1/hooks/listing-query", &widget)).await;
    assert_eq!(
        body["data"]["query"]["statuses"],
        json!(["published", "archiveless"])
    );
    assert_eq!(body["data"]["query"]["exclude_terms"], json!([]));
}

#[tokio::test]
async fn slots_lists_configured_slots() {
    let app = build_app();
    let (status, body) = send(&app, get("/api/v1/slots")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!([
            {"name": "sidebar", "label": "Sidebar"},
            {"name": "footer", "label": "footer"}
        ])
    );
}

#[tokio::test]
async fn health_without_database_is_no_content() {
    let app = build_app();
    let response = app
        .clone()
        .oneshot(get("/_health/db"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let ctx = response
        .extensions()
        .get::<RequestContext>()
        .expect("request context");
    assert!(!ctx.request_id.is_empty());
    assert_eq!(
        response.headers().get(&REQUEST_ID_HEADER).expect("header"),
        ctx.request_id.as_str()
    );

    let request = Request::builder()
        .uri("/_health/db")
        .header("x-request-id", "host-7")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(
        response.headers().get(&REQUEST_ID_HEADER).expect("header"),
        "host-7"
    );
}
