//! Cache key definitions for eligible-id lists.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::domain::query::ContentQuery;

/// Every eligible-list key starts with this prefix, followed by the slot name.
pub const ELIGIBLE_KEY_PREFIX: &str = "sponsorship_manager_eligible_posts_";

/// Key of one cached eligible-id list.
///
/// Calls without overrides share the plain slot key. Calls with overrides get a
/// key suffixed by a hash of the overrides so a narrowed result never answers
/// for the unfiltered slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EligibleKey(String);

impl EligibleKey {
    pub fn for_slot(slot: &str, overrides: Option<&ContentQuery>) -> Self {
        match overrides.filter(|query| **query != ContentQuery::default()) {
            None => Self(format!("{ELIGIBLE_KEY_PREFIX}{slot}")),
            Some(query) => Self(format!(
                "{ELIGIBLE_KEY_PREFIX}{slot}_{:016x}",
                hash_value(query)
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EligibleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash any hashable value to a u64.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::MetaClause;

    #[test]
    fn plain_slot_key_uses_prefix() {
        let key = EligibleKey::for_slot("sidebar", None);
        assert_eq!(key.as_str(), "sponsorship_manager_eligible_posts_sidebar");
    }

    #[test]
    fn empty_overrides_share_the_slot_key() {
        let empty = ContentQuery::default();
        assert_eq!(
            EligibleKey::for_slot("sidebar", Some(&empty)),
            EligibleKey::for_slot("sidebar", None)
        );
    }

    #[test]
    fn distinct_overrides_get_distinct_keys() {
        let a = ContentQuery {
            meta: vec![MetaClause::exists("featured")],
            ..Default::default()
        };
        let b = ContentQuery {
            limit: Some(3),
            ..Default::default()
        };
        let key_a = EligibleKey::for_slot("sidebar", Some(&a));
        let key_b = EligibleKey::for_slot("sidebar", Some(&b));

        assert_ne!(key_a, key_b);
        assert_ne!(key_a, EligibleKey::for_slot("sidebar", None));
        assert!(key_a.as_str().starts_with("sponsorship_manager_eligible_posts_sidebar_"));
        assert_eq!(key_a, EligibleKey::for_slot("sidebar", Some(&a)));
    }
}
