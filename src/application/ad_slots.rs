//! Ad-slot eligibility and targeting.
//!
//! An item is eligible for a slot when it carries the slot's targeting flag and
//! passes the slot's filters. Eligible id lists are cached per slot for a fixed
//! TTL; failures never reach the caller, they degrade to an empty list.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use time::Duration;
use tracing::{debug, warn};

use crate::application::repos::{ContentRepo, ItemMetaRepo, RepoError};
use crate::cache::{EligibleCacheStore, EligibleKey};
use crate::domain::entities::ItemId;
use crate::domain::query::{ContentQuery, MetaClause};
use crate::domain::slots::{SlotCatalog, SlotDefinition, augment};
use crate::domain::sponsorship::targeting_key;
use crate::domain::types::ContentStatus;

pub const DEFAULT_TTL_MINUTES: i64 = 15;
pub const DEFAULT_MAX_ELIGIBLE: u32 = 50;

/// Value stored under a targeting key; only presence matters.
const TARGETED_FLAG: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdSlotPolicy {
    pub ttl: Duration,
    pub max_eligible: u32,
    /// Ignore cached lists on every read. Fresh lists are still stored.
    pub skip_cache: bool,
    /// Content types used when a slot does not name any.
    pub enabled_content_types: Vec<String>,
}

impl Default for AdSlotPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            max_eligible: DEFAULT_MAX_ELIGIBLE,
            skip_cache: false,
            enabled_content_types: vec!["post".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheMode {
    Use,
    Bypass,
}

pub struct AdSlotService {
    catalog: Arc<SlotCatalog>,
    policy: AdSlotPolicy,
    content: Arc<dyn ContentRepo>,
    meta: Arc<dyn ItemMetaRepo>,
    cache: Arc<dyn EligibleCacheStore>,
}

impl AdSlotService {
    pub fn new(
        catalog: Arc<SlotCatalog>,
        policy: AdSlotPolicy,
        content: Arc<dyn ContentRepo>,
        meta: Arc<dyn ItemMetaRepo>,
        cache: Arc<dyn EligibleCacheStore>,
    ) -> Self {
        Self {
            catalog,
            policy,
            content,
            meta,
            cache,
        }
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> &AdSlotPolicy {
        &self.policy
    }

    /// `(name, label)` pairs for every configured slot, for editor choice lists.
    pub fn slot_options(&self) -> Vec<(String, String)> {
        self.catalog
            .iter()
            .map(|slot| (slot.name.clone(), slot.label.clone()))
            .collect()
    }

    /// Ids of items eligible for `slot`, served from cache when fresh.
    ///
    /// Unknown slots yield an empty list without touching storage.
    pub async fn get_eligible(&self, slot: &str, overrides: Option<&ContentQuery>) -> Vec<ItemId> {
        self.eligible(slot, overrides, CacheMode::Use).await
    }

    /// Same as [`Self::get_eligible`] but always recomputes; the fresh list is
    /// still written back.
    pub async fn get_eligible_fresh(
        &self,
        slot: &str,
        overrides: Option<&ContentQuery>,
    ) -> Vec<ItemId> {
        self.eligible(slot, overrides, CacheMode::Bypass).await
    }

    async fn eligible(
        &self,
        slot_name: &str,
        overrides: Option<&ContentQuery>,
        mode: CacheMode,
    ) -> Vec<ItemId> {
        let Some(slot) = self.catalog.get(slot_name) else {
            debug!(
                target = "sponsorship::ad_slots",
                slot = slot_name,
                "Eligibility requested for unknown slot"
            );
            return Vec::new();
        };

        let key = EligibleKey::for_slot(&slot.name, overrides);

        if mode == CacheMode::Use && !self.policy.skip_cache {
            match self.cache.get(&key).await {
                Ok(Some(ids)) => {
                    counter!("sponsorship_eligible_cache_hit_total", "slot" => slot.name.clone())
                        .increment(1);
                    return ids;
                }
                Ok(None) => {
                    counter!("sponsorship_eligible_cache_miss_total", "slot" => slot.name.clone())
                        .increment(1);
                }
                Err(err) => {
                    warn!(
                        target = "sponsorship::ad_slots",
                        slot = %slot.name,
                        key = %key,
                        error = %err,
                        "Eligible cache read failed; recomputing"
                    );
                }
            }
        }

        self.refresh(slot, overrides, &key).await
    }

    async fn refresh(
        &self,
        slot: &SlotDefinition,
        overrides: Option<&ContentQuery>,
        key: &EligibleKey,
    ) -> Vec<ItemId> {
        counter!("sponsorship_eligible_recompute_total", "slot" => slot.name.clone()).increment(1);
        let query = self.build_query(slot, overrides);
        let started = Instant::now();
        let result = self.content.query_ids(&query).await;
        histogram!("sponsorship_eligible_query_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        let ids = match result {
            Ok(ids) => ids,
            Err(err) => {
                // Nothing is cached so the next request retries the query.
                counter!("sponsorship_eligible_query_error_total", "slot" => slot.name.clone())
                    .increment(1);
                warn!(
                    target = "sponsorship::ad_slots",
                    slot = %slot.name,
                    error = %err,
                    "Eligibility query failed; serving empty list"
                );
                return Vec::new();
            }
        };

        if let Err(err) = self.cache.put(key, &ids, self.policy.ttl).await {
            warn!(
                target = "sponsorship::ad_slots",
                slot = %slot.name,
                key = %key,
                error = %err,
                "Failed to store eligible list"
            );
        }

        debug!(
            target = "sponsorship::ad_slots",
            slot = %slot.name,
            count = ids.len(),
            "Computed eligible list"
        );
        ids
    }

    /// The full filter set used to compute eligibility for `slot`.
    pub fn build_query(&self, slot: &SlotDefinition, overrides: Option<&ContentQuery>) -> ContentQuery {
        let mut query = slot.filters.clone();

        let targeted = MetaClause::exists(targeting_key(&slot.name));
        if !query.meta.contains(&targeted) {
            query.meta.insert(0, targeted);
        }

        if let Some(overrides) = overrides {
            augment(&mut query, overrides);
        }

        if query.content_types.is_empty() {
            query.content_types = self.policy.enabled_content_types.clone();
        }
        if query.statuses.is_empty() {
            query.statuses = ContentStatus::PUBLIC.to_vec();
        }

        let max = self.policy.max_eligible;
        query.limit = Some(query.limit.map_or(max, |limit| limit.min(max)));
        query.exclude_sticky = true;
        query
    }

    /// Set the targeting flag for every selected known slot and clear it for
    /// every other known slot. Returns the slots the item is now targeted to.
    ///
    /// Unknown names in `selected` are ignored.
    pub async fn set_targeting(
        &self,
        item: ItemId,
        selected: &[String],
    ) -> Result<Vec<String>, RepoError> {
        let mut targeted = Vec::new();
        for slot in self.catalog.iter() {
            let key = targeting_key(&slot.name);
            if selected.iter().any(|name| name == &slot.name) {
                self.meta.put_meta(item, &key, TARGETED_FLAG).await?;
                targeted.push(slot.name.clone());
            } else {
                self.meta.delete_meta(item, &key).await?;
            }
        }

        for name in selected {
            if !self.catalog.is_active(name) {
                debug!(
                    target = "sponsorship::ad_slots",
                    item_id = item,
                    slot = %name,
                    "Ignoring targeting for unknown slot"
                );
            }
        }

        Ok(targeted)
    }

    pub async fn is_targeted(&self, item: ItemId, slot: &str) -> Result<bool, RepoError> {
        if !self.catalog.is_active(slot) {
            return Ok(false);
        }
        Ok(self
            .meta
            .get_meta(item, &targeting_key(slot))
            .await?
            .is_some())
    }

    /// Drop the cached list for `slot` so the next read recomputes it.
    ///
    /// Only the plain slot list is dropped. Lists cached under override keys
    /// are not tracked per slot and live out their TTL.
    pub async fn invalidate(&self, slot: &str) -> Result<(), RepoError> {
        self.cache.remove(&EligibleKey::for_slot(slot, None)).await
    }
}
