//! Hidden-term bookkeeping for sponsored items.
//!
//! Sponsored items can be kept out of recent-post listings and feeds by
//! tagging them with hidden visibility terms, which main listings then exclude.

use tracing::debug;

use crate::domain::entities::ContentItem;
use crate::domain::query::ListingQuery;
use crate::domain::sponsorship::SponsorshipInfo;
use crate::domain::types::{ContentStatus, VisibilityTerm};

/// Terms the item should carry after a save, or `None` when the item is out of
/// scope and its terms must be left untouched.
///
/// Only public items of an enabled content type are in scope. Items without a
/// campaign lose their hidden terms.
pub fn hidden_terms_on_save(
    item: &ContentItem,
    status: ContentStatus,
    info: &SponsorshipInfo,
    has_campaign: bool,
    enabled_content_types: &[String],
) -> Option<Vec<VisibilityTerm>> {
    if !status.is_public() {
        return None;
    }
    if !enabled_content_types.contains(&item.content_type) {
        return None;
    }
    let mut terms = Vec::new();
    if !has_campaign {
        return Some(terms);
    }

    if info.hide_from_recent_posts {
        terms.push(VisibilityTerm::HiddenFromLoop);
    }
    if info.hide_from_feeds {
        terms.push(VisibilityTerm::HiddenFromFeed);
    }
    Some(terms)
}

/// Exclude hidden items from a main listing. Returns the term excluded, if any.
pub fn exclude_hidden(listing: &mut ListingQuery) -> Option<VisibilityTerm> {
    let context = listing.context;
    if !context.main {
        return None;
    }
    // Archive feeds count as archives.
    let term = if context.archive || context.home {
        VisibilityTerm::HiddenFromLoop
    } else if context.feed {
        VisibilityTerm::HiddenFromFeed
    } else {
        return None;
    };
    listing.query.exclude_term(term);
    debug!(
        target = "sponsorship::visibility",
        term = term.as_str(),
        "Excluded hidden sponsored items from listing"
    );
    Some(term)
}
