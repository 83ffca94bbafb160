//! Content query filters shared by listings and ad-slot eligibility.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::entities::{CampaignId, ContentItem, ItemId};
use crate::domain::types::{ContentStatus, MetaCompare, MetaValueType, VisibilityTerm};

/// A single predicate on item metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaClause {
    pub key: String,
    #[serde(default)]
    pub compare: MetaCompare,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, rename = "type")]
    pub value_type: MetaValueType,
}

impl MetaClause {
    pub fn exists(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            compare: MetaCompare::Exists,
            value: None,
            value_type: MetaValueType::Char,
        }
    }

    pub fn compare(
        key: impl Into<String>,
        compare: MetaCompare,
        value: impl Into<String>,
        value_type: MetaValueType,
    ) -> Self {
        Self {
            key: key.into(),
            compare,
            value: Some(value.into()),
            value_type,
        }
    }

    pub fn matches(&self, meta: &HashMap<String, String>) -> bool {
        let stored = meta.get(&self.key);
        match self.compare {
            MetaCompare::Exists => stored.is_some(),
            MetaCompare::NotExists => stored.is_none(),
            compare => {
                let (Some(stored), Some(expected)) = (stored, self.value.as_ref()) else {
                    return false;
                };
                if compare == MetaCompare::Like {
                    return stored
                        .to_lowercase()
                        .contains(&expected.to_lowercase());
                }
                let ordering = match self.value_type {
                    MetaValueType::Char => Some(stored.as_str().cmp(expected.as_str())),
                    MetaValueType::Numeric => {
                        match (stored.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
                            (Ok(left), Ok(right)) => left.partial_cmp(&right),
                            _ => None,
                        }
                    }
                };
                let Some(ordering) = ordering else {
                    return false;
                };
                match compare {
                    MetaCompare::Eq => ordering == Ordering::Equal,
                    MetaCompare::NotEq => ordering != Ordering::Equal,
                    MetaCompare::Gt => ordering == Ordering::Greater,
                    MetaCompare::Gte => ordering != Ordering::Less,
                    MetaCompare::Lt => ordering == Ordering::Less,
                    MetaCompare::Lte => ordering != Ordering::Greater,
                    MetaCompare::Exists | MetaCompare::NotExists | MetaCompare::Like => false,
                }
            }
        }
    }
}

/// Filter set for selecting content items. Empty lists place no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentQuery {
    pub content_types: Vec<String>,
    pub statuses: Vec<ContentStatus>,
    pub ids: Vec<ItemId>,
    pub campaigns: Vec<CampaignId>,
    pub meta: Vec<MetaClause>,
    pub exclude_terms: Vec<VisibilityTerm>,
    pub exclude_sticky: bool,
    pub limit: Option<u32>,
}

/// Everything known about one item when evaluating a query in memory.
pub struct ItemFacts<'a> {
    pub item: &'a ContentItem,
    pub meta: &'a HashMap<String, String>,
    pub campaigns: &'a BTreeSet<CampaignId>,
    pub terms: &'a BTreeSet<VisibilityTerm>,
}

impl ContentQuery {
    pub fn matches(&self, facts: &ItemFacts<'_>) -> bool {
        let item = facts.item;
        if !self.content_types.is_empty() && !self.content_types.contains(&item.content_type) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&item.status) {
            return false;
        }
        if !self.ids.is_empty() && !self.ids.contains(&item.id) {
            return false;
        }
        if !self.campaigns.is_empty()
            && !self.campaigns.iter().any(|id| facts.campaigns.contains(id))
        {
            return false;
        }
        if self.exclude_sticky && item.sticky {
            return false;
        }
        if self.exclude_terms.iter().any(|term| facts.terms.contains(term)) {
            return false;
        }
        self.meta.iter().all(|clause| clause.matches(facts.meta))
    }

    pub fn includes_status(&self, status: ContentStatus) -> bool {
        self.statuses.contains(&status)
    }

    pub fn remove_status(&mut self, status: ContentStatus) {
        self.statuses.retain(|candidate| *candidate != status);
    }

    pub fn exclude_term(&mut self, term: VisibilityTerm) {
        if !self.exclude_terms.contains(&term) {
            self.exclude_terms.push(term);
        }
    }
}

/// What kind of listing the host is building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryContext {
    /// The page's primary query, as opposed to a secondary widget/module query.
    pub main: bool,
    pub feed: bool,
    pub singular: bool,
    pub archive: bool,
    pub home: bool,
    pub campaign_archive: bool,
    /// Caller opted in to archiveless items.
    pub show_archiveless: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub context: QueryContext,
    #[serde(default)]
    pub query: ContentQuery,
}

impl ListingQuery {
    /// A listing that selects every public status, the host's default.
    pub fn public(context: QueryContext) -> Self {
        Self {
            context,
            query: ContentQuery {
                statuses: ContentStatus::PUBLIC.to_vec(),
                ..Default::default()
            },
        }
    }
}
