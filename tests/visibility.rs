use std::collections::BTreeSet;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use url::Url;

use sponsorship_manager::application::ad_slots::AdSlotPolicy;
use sponsorship_manager::application::manager::{
    ContentSave, ManagerConfig, ManagerDeps, SponsorshipManager,
};
use sponsorship_manager::application::pixel::PixelConfig;
use sponsorship_manager::application::repos::{ContentRepo, VisibilityTermsRepo};
use sponsorship_manager::application::slot_content::RendererRegistry;
use sponsorship_manager::cache::{CacheConfig, ManualClock, MemoryEligibleStore};
use sponsorship_manager::config::SLOT_API_PATH;
use sponsorship_manager::domain::entities::{CampaignDisplay, CampaignRecord, ContentItem};
use sponsorship_manager::domain::query::{ListingQuery, QueryContext};
use sponsorship_manager::domain::slots::SlotCatalog;
use sponsorship_manager::domain::sponsorship::SponsorshipInfo;
use sponsorship_manager::domain::types::{ContentStatus, VisibilityTerm};
use sponsorship_manager::infra::memory::MemoryRepositories;

const CAMPAIGN_ID: i64 = 3;

fn setup() -> (SponsorshipManager, Arc<MemoryRepositories>) {
    let repos = Arc::new(MemoryRepositories::new());
    repos.insert_campaign(CampaignRecord {
        id: CAMPAIGN_ID,
        parent_id: None,
        slug: "acme".to_string(),
        name: "Acme".to_string(),
        description: None,
        display: CampaignDisplay::default(),
    });
    let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
    let cache = Arc::new(MemoryEligibleStore::new(&CacheConfig::default(), clock));
    let config = ManagerConfig {
        catalog: SlotCatalog::default(),
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
        terms: repos.clone(),
        cache,
    };
    let manager = SponsorshipManager::build(config, deps, RendererRegistry::with_builtin());
    (manager, repos)
}

fn item(id: i64, content_type: &str) -> ContentItem {
    ContentItem {
        id,
        content_type: content_type.to_string(),
        title: format!("Story {id}"),
        permalink: format!("https://news.example/{id}/"),
        excerpt: String::new(),
        status: ContentStatus::Published,
        sticky: false,
        published_at: Some(OffsetDateTime::UNIX_EPOCH + Duration::hours(id)),
    }
}

fn sponsored(hide_from_recent_posts: bool, hide_from_feeds: bool) -> SponsorshipInfo {
    SponsorshipInfo {
        campaign: Some(CAMPAIGN_ID),
        hide_from_recent_posts,
        hide_from_feeds,
        ..Default::default()
    }
}

async fn save(manager: &SponsorshipManager, item: ContentItem, info: SponsorshipInfo) {
    manager
        .on_content_saved(ContentSave { item, info })
        .await
        .expect("save");
}

async fn run_listing(
    manager: &SponsorshipManager,
    repos: &MemoryRepositories,
    context: QueryContext,
) -> Vec<i64> {
    let listing = manager.on_listing_query_built(ListingQuery::public(context));
    repos.query_ids(&listing.query).await.expect("query")
}

#[tokio::test]
async fn hidden_items_stay_out_of_main_listings() {
    let (manager, repos) = setup();
    save(&manager, item(1, "post"), SponsorshipInfo::default()).await;
    save(&manager, item(2, "post"), sponsored(true, false)).await;
    save(&manager, item(3, "post"), sponsored(false, true)).await;

    let home = QueryContext {
        main: true,
        home: true,
        ..Default::default()
    };
    assert_eq!(run_listing(&manager, &repos, home).await, vec![3, 1]);

    let feed = QueryContext {
        main: true,
        feed: true,
        ..Default::default()
    };
    assert_eq!(run_listing(&manager, &repos, feed).await, vec![2, 1]);

    let widget = QueryContext::default();
    assert_eq!(run_listing(&manager, &repos, widget).await, vec![3, 2, 1]);
}

#[tokio::test]
async fn archiveless_items_are_reachable_but_unlisted() {
    let (manager, repos) = setup();
    save(&manager, item(1, "post"), SponsorshipInfo::default()).await;
    let archiveless = SponsorshipInfo {
        archiveless: true,
        ..Default::default()
    };
    save(&manager, item(2, "post"), archiveless).await;

    let stored = repos.find_item(2).await.expect("find").expect("item");
    assert_eq!(stored.status, ContentStatus::Archiveless);

    let archive = QueryContext {
        main: true,
        archive: true,
        ..Default::default()
    };
    assert_eq!(run_listing(&manager, &repos, archive).await, vec![1]);

    let singular = QueryContext {
        main: true,
        singular: true,
        ..Default::default()
    };
    assert_eq!(run_listing(&manager, &repos, singular).await, vec![2, 1]);

    let opted_in = QueryContext {
        main: true,
        archive: true,
        show_archiveless: true,
        ..Default::default()
    };
    assert_eq!(run_listing(&manager, &repos, opted_in).await, vec![2, 1]);

    // Clearing the flag republishes the item.
    save(&manager, item(2, "post"), SponsorshipInfo::default()).await;
    let stored = repos.find_item(2).await.expect("find").expect("item");
    assert_eq!(stored.status, ContentStatus::Published);
    assert_eq!(run_listing(&manager, &repos, archive).await, vec![2, 1]);
}

#[tokio::test]
async fn hidden_terms_follow_scope_rules() {
    let (manager, repos) = setup();

    save(&manager, item(1, "post"), sponsored(true, true)).await;
    assert_eq!(
        repos.terms_for_item(1).await.expect("terms"),
        BTreeSet::from([VisibilityTerm::HiddenFromLoop, VisibilityTerm::HiddenFromFeed])
    );

    // Unchecking both boxes clears the terms.
    save(&manager, item(1, "post"), sponsored(false, false)).await;
    assert!(repos.terms_for_item(1).await.expect("terms").is_empty());

    // Pages are not sponsorship-enabled, drafts are not public and unsponsored
    // items have no campaign, so none of them gain terms.
    save(&manager, item(2, "page"), sponsored(true, true)).await;
    let mut draft = item(3, "post");
    draft.status = ContentStatus::Draft;
    save(&manager, draft, sponsored(true, true)).await;
    let unsponsored = SponsorshipInfo {
        hide_from_recent_posts: true,
        ..Default::default()
    };
    save(&manager, item(4, "post"), unsponsored).await;

    for id in [2, 3, 4] {
        assert!(
            repos.terms_for_item(id).await.expect("terms").is_empty(),
            "item {id} gained terms"
        );
    }
}

#[tokio::test]
async fn dropping_the_campaign_clears_hidden_terms() {
    let (manager, repos) = setup();
    save(&manager, item(1, "post"), sponsored(false, true)).await;
    assert_eq!(
        repos.terms_for_item(1).await.expect("terms"),
        BTreeSet::from([VisibilityTerm::HiddenFromFeed])
    );

    let unsponsored = SponsorshipInfo {
        hide_from_feeds: true,
        ..Default::default()
    };
    save(&manager, item(1, "post"), unsponsored).await;
    assert!(repos.terms_for_item(1).await.expect("terms").is_empty());

    let feed = QueryContext {
        main: true,
        feed: true,
        ..Default::default()
    };
    assert_eq!(run_listing(&manager, &repos, feed).await, vec![1]);
}
