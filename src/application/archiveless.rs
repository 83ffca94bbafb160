//! The archiveless status.
//!
//! Archiveless items are published (reachable at their permalink, eligible for
//! ad slots) but stay out of main listings and feeds unless the caller opts in.

use tracing::debug;

use crate::domain::query::{ListingQuery, QueryContext};
use crate::domain::sponsorship::SponsorshipInfo;
use crate::domain::types::ContentStatus;

/// Status to persist for an item being saved.
///
/// Only a publish with the archiveless flag set becomes archiveless; every
/// other combination keeps the requested status.
pub fn status_for_write(requested: ContentStatus, info: &SponsorshipInfo) -> ContentStatus {
    match requested {
        ContentStatus::Published if info.archiveless => ContentStatus::Archiveless,
        ContentStatus::Archiveless if !info.archiveless => ContentStatus::Published,
        other => other,
    }
}

/// Status shown to editors. Archiveless items present as published so the
/// editor's publish controls behave normally.
pub fn status_for_editing(stored: ContentStatus) -> ContentStatus {
    match stored {
        ContentStatus::Archiveless => ContentStatus::Published,
        other => other,
    }
}

/// Whether a listing built in `context` should drop archiveless items.
pub fn hides_archiveless(context: &QueryContext) -> bool {
    if context.show_archiveless {
        return false;
    }
    if !context.main && !context.feed {
        // Secondary queries (widgets, related-content modules) keep them.
        return false;
    }
    if context.main && (context.singular || context.campaign_archive) {
        return false;
    }
    true
}

/// Remove the archiveless status from a listing that should not show it.
///
/// Listings that never selected archiveless are left alone. Returns whether
/// the query changed.
pub fn filter_listing(listing: &mut ListingQuery) -> bool {
    if !listing.query.includes_status(ContentStatus::Archiveless) {
        return false;
    }
    if !hides_archiveless(&listing.context) {
        return false;
    }
    listing.query.remove_status(ContentStatus::Archiveless);
    debug!(
        target = "sponsorship::archiveless",
        main = listing.context.main,
        feed = listing.context.feed,
        "Excluded archiveless items from listing"
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archiveless_info() -> SponsorshipInfo {
        SponsorshipInfo {
            archiveless: true,
            ..Default::default()
        }
    }

    #[test]
    fn publish_with_flag_becomes_archiveless() {
        assert_eq!(
            status_for_write(ContentStatus::Published, &archiveless_info()),
            ContentStatus::Archiveless
        );
        assert_eq!(
            status_for_write(ContentStatus::Published, &SponsorshipInfo::default()),
            ContentStatus::Published
        );
    }

    #[test]
    fn drafts_keep_their_status() {
        assert_eq!(
            status_for_write(ContentStatus::Draft, &archiveless_info()),
            ContentStatus::Draft
        );
    }

    #[test]
    fn clearing_flag_republishes() {
        assert_eq!(
            status_for_write(ContentStatus::Archiveless, &SponsorshipInfo::default()),
            ContentStatus::Published
        );
    }

    #[test]
    fn editors_see_published() {
        assert_eq!(
            status_for_editing(ContentStatus::Archiveless),
            ContentStatus::Published
        );
        assert_eq!(status_for_editing(ContentStatus::Draft), ContentStatus::Draft);
    }

    #[test]
    fn main_archive_hides_archiveless() {
        let mut listing = ListingQuery::public(QueryContext {
            main: true,
            archive: true,
            ..Default::default()
        });
        assert!(filter_listing(&mut listing));
        assert_eq!(listing.query.statuses, vec![ContentStatus::Published]);
    }

    #[test]
    fn feeds_hide_archiveless() {
        let mut listing = ListingQuery::public(QueryContext {
            feed: true,
            ..Default::default()
        });
        assert!(filter_listing(&mut listing));
    }

    #[test]
    fn singular_and_campaign_archive_keep_archiveless() {
        for context in [
            QueryContext {
                main: true,
                singular: true,
                ..Default::default()
            },
            QueryContext {
                main: true,
                campaign_archive: true,
                ..Default::default()
            },
            QueryContext {
                main: true,
                show_archiveless: true,
                ..Default::default()
            },
            QueryContext::default(),
        ] {
            let mut listing = ListingQuery::public(context);
            assert!(!filter_listing(&mut listing), "{context:?}");
            assert!(listing.query.includes_status(ContentStatus::Archiveless));
        }
    }

    #[test]
    fn listings_without_archiveless_are_untouched() {
        let mut listing = ListingQuery {
            context: QueryContext {
                main: true,
                ..Default::default()
            },
            query: crate::domain::query::ContentQuery {
                statuses: vec![ContentStatus::Draft],
                ..Default::default()
            },
        };
        assert!(!filter_listing(&mut listing));
        assert_eq!(listing.query.statuses, vec![ContentStatus::Draft]);
    }
}
