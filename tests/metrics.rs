use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use metrics_util::debugging::DebuggingRecorder;
use time::OffsetDateTime;
use tower::ServiceExt;
use url::Url;

use sponsorship_manager::application::ad_slots::AdSlotPolicy;
use sponsorship_manager::application::manager::{
    ContentSave, ManagerConfig, ManagerDeps, SponsorshipManager,
};
use sponsorship_manager::application::pixel::{PixelConfig, Viewer};
use sponsorship_manager::application::slot_content::RendererRegistry;
use sponsorship_manager::cache::{CacheConfig, ManualClock, MemoryEligibleStore};
use sponsorship_manager::config::SLOT_API_PATH;
use sponsorship_manager::domain::entities::ContentItem;
use sponsorship_manager::domain::query::ContentQuery;
use sponsorship_manager::domain::slots::{SlotCatalog, SlotDefinition};
use sponsorship_manager::domain::sponsorship::SponsorshipInfo;
use sponsorship_manager::domain::types::ContentStatus;
use sponsorship_manager::infra::http::{ApiState, build_router};
use sponsorship_manager::infra::memory::MemoryRepositories;

#[tokio::test]
async fn sponsorship_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let slots = ["sidebar", "footer"]
        .into_iter()
        .map(|name| SlotDefinition::new(name, "", ContentQuery::default()).expect("slot"))
        .collect();
    let repos = Arc::new(MemoryRepositories::new());
    let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
    // A single entry forces an eviction once both slots are read.
    let cache = Arc::new(MemoryEligibleStore::new(
        &CacheConfig {
            capacity: 1,
            ..Default::default()
        },
        clock,
    ));
    let config = ManagerConfig {
        catalog: SlotCatalog::new(slots).expect("catalog"),
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
    let manager = Arc::new(SponsorshipManager::build(
        config,
        deps,
        RendererRegistry::with_builtin(),
    ));

    manager
        .on_content_saved(ContentSave {
            item: ContentItem {
                id: 42,
                content_type: "post".to_string(),
                title: "Sponsored".to_string(),
                permalink: "https://news.example/42/".to_string(),
                excerpt: String::new(),
                status: ContentStatus::Published,
                sticky: false,
                published_at: None,
            },
            info: SponsorshipInfo {
                tracking_pixel: Some("https://ads.example/pixel".to_string()),
                ad_slots: vec!["sidebar".to_string()],
                ..Default::default()
            },
        })
        .await
        .expect("save");

    // Eligible cache miss, recompute, hit, eviction.
    let ad_slots = manager.ad_slots();
    assert_eq!(ad_slots.get_eligible("sidebar", None).await, vec![42]);
    assert_eq!(ad_slots.get_eligible("sidebar", None).await, vec![42]);
    assert!(ad_slots.get_eligible("footer", None).await.is_empty());

    let pixel = manager
        .pixel_for_item(42, Viewer::default())
        .await
        .expect("pixel");
    assert!(pixel.is_some());

    // Slot API failure counter.
    let app = build_router(ApiState::new(manager.clone(), None));
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/slots/footer/items/42")
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("router should respond");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "sponsorship_eligible_cache_hit_total",
        "sponsorship_eligible_cache_miss_total",
        "sponsorship_eligible_cache_evict_total",
        "sponsorship_eligible_cache_entries",
        "sponsorship_eligible_recompute_total",
        "sponsorship_eligible_query_ms",
        "sponsorship_pixel_render_total",
        "sponsorship_slot_api_failure_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
