//! Invalidation plan generation.
//!
//! Turns one mutation event into the set of keys that may now be stale.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::content::{ContentItem, ContentTaxonomy};
use crate::domain::page::ArchiveKind;

use super::config::CacheSettings;
use super::events::{EventKind, SaveKind};
use super::keys::CacheKey;

/// Listing pages deleted per aggregate key when nothing else is configured.
pub const DEFAULT_PAGINATION_DEPTH: u32 = 10;

/// Deletions to execute for one event.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    /// Remove every entry instead of individual keys.
    pub clear_all: bool,
    /// Keys to delete, ordered for stable logs.
    pub delete: BTreeSet<CacheKey>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvalidationPlan {{ clear_all: {}, delete: {} }}",
            self.clear_all,
            self.delete.len()
        )
    }
}

impl InvalidationPlan {
    /// Plan the deletions for `kind`.
    ///
    /// - Site-wide events clear everything
    /// - A save that changed nothing plans nothing
    /// - Per-item events cascade to every aggregate page listing the item
    pub fn for_event(
        kind: &EventKind,
        taxonomy: &dyn ContentTaxonomy,
        settings: &CacheSettings,
        pagination_depth: u32,
    ) -> Self {
        if kind.clears_everything() {
            return Self {
                clear_all: true,
                delete: BTreeSet::new(),
            };
        }

        if let EventKind::ContentSaved {
            save: SaveKind::Unchanged,
            ..
        } = kind
        {
            return Self::default();
        }

        let Some(item_id) = kind.item_id() else {
            return Self::default();
        };

        let mut plan = PlanBuilder {
            keys: BTreeSet::new(),
            pagination_depth,
        };
        match taxonomy.describe(item_id) {
            Some(item) => plan.item_cascade(&item, settings),
            None => plan.unknown_item(item_id, settings),
        }

        Self {
            clear_all: false,
            delete: plan.keys,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.clear_all && self.delete.is_empty()
    }
}

struct PlanBuilder {
    keys: BTreeSet<CacheKey>,
    pagination_depth: u32,
}

impl PlanBuilder {
    fn item_cascade(&mut self, item: &ContentItem, settings: &CacheSettings) {
        if item.is_static_page() {
            self.keys.insert(CacheKey::static_page(item.id));
        } else {
            self.keys.insert(CacheKey::single(item.id));
        }

        if item.is_post_class() {
            self.listings(settings);
        }

        if !settings.cache_archive {
            return;
        }

        for term_id in &item.categories {
            self.aggregate(CacheKey::archive(&ArchiveKind::Category { term_id: *term_id }));
        }
        for term_id in &item.tags {
            self.aggregate(CacheKey::archive(&ArchiveKind::Tag { term_id: *term_id }));
        }
        self.aggregate(CacheKey::archive(&ArchiveKind::Author {
            author_id: item.author_id,
        }));
        for key in CacheKey::date_archives(item.published_on) {
            self.aggregate(key);
        }
        for term in &item.terms {
            self.aggregate(CacheKey::archive(&ArchiveKind::Taxonomy {
                taxonomy: term.taxonomy.clone(),
                term_id: term.term_id,
            }));
        }
        self.aggregate(CacheKey::archive(&ArchiveKind::PostType {
            post_type: item.post_type.clone(),
        }));
    }

    /// The item is gone from the taxonomy; its class and filing are unknown.
    fn unknown_item(&mut self, item_id: u64, settings: &CacheSettings) {
        self.keys.insert(CacheKey::single(item_id));
        self.keys.insert(CacheKey::static_page(item_id));
        self.listings(settings);
    }

    fn listings(&mut self, settings: &CacheSettings) {
        if settings.cache_home {
            self.aggregate(CacheKey::home());
        }
        if settings.cache_blog {
            self.aggregate(CacheKey::blog());
        }
    }

    /// Insert a listing key together with its later pages.
    fn aggregate(&mut self, key: CacheKey) {
        for paged in 2..=self.pagination_depth {
            self.keys.insert(key.paged(paged));
        }
        self.keys.insert(key);
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::domain::content::{InMemoryTaxonomy, TaxonomyTerm};

    fn post(id: u64) -> ContentItem {
        ContentItem {
            id,
            post_type: "post".to_string(),
            author_id: 5,
            published_on: date!(2024 - 03 - 09),
            categories: vec![7],
            tags: vec![3],
            terms: vec![TaxonomyTerm {
                taxonomy: "genre".to_string(),
                term_id: 12,
            }],
        }
    }

    fn all_on() -> CacheSettings {
        CacheSettings {
            cache_home: true,
            cache_blog: true,
            cache_archive: true,
            cache_page: true,
            ..Default::default()
        }
    }

    fn taxonomy_with(items: impl IntoIterator<Item = ContentItem>) -> InMemoryTaxonomy {
        let taxonomy = InMemoryTaxonomy::new();
        for item in items {
            taxonomy.upsert(item);
        }
        taxonomy
    }

    fn keys(plan: &InvalidationPlan) -> Vec<&str> {
        plan.delete.iter().map(CacheKey::as_str).collect()
    }

    fn saved(item_id: u64) -> EventKind {
        EventKind::ContentSaved {
            item_id,
            save: SaveKind::Updated,
        }
    }

    #[test]
    fn post_update_cascades_to_every_listing() {
        let taxonomy = taxonomy_with([post(42)]);
        let plan = InvalidationPlan::for_event(&saved(42), &taxonomy, &all_on(), 1);

        assert!(!plan.clear_all);
        assert_eq!(
            keys(&plan),
            vec![
                "cache_archive_post",
                "cache_author_5",
                "cache_blog",
                "cache_category_7",
                "cache_date_2024",
                "cache_date_2024_03",
                "cache_date_2024_03_09",
                "cache_home",
                "cache_post_42",
                "cache_tag_3",
                "cache_tax_genre_12",
            ]
        );
    }

    #[test]
    fn listings_follow_their_flags() {
        let taxonomy = taxonomy_with([post(42)]);
        let plan =
            InvalidationPlan::for_event(&saved(42), &taxonomy, &CacheSettings::default(), 1);

        assert_eq!(keys(&plan), vec!["cache_post_42"]);
    }

    #[test]
    fn static_page_uses_its_own_key_and_skips_listings() {
        let page = ContentItem {
            post_type: "page".to_string(),
            categories: vec![],
            tags: vec![],
            terms: vec![],
            ..post(9)
        };
        let taxonomy = taxonomy_with([page]);
        let settings = CacheSettings {
            cache_home: true,
            cache_blog: true,
            ..Default::default()
        };

        let plan = InvalidationPlan::for_event(&saved(9), &taxonomy, &settings, 1);

        assert_eq!(keys(&plan), vec!["cache_page_9"]);
    }

    #[test]
    fn custom_post_types_skip_front_and_blog() {
        let book = ContentItem {
            post_type: "book".to_string(),
            ..post(11)
        };
        let taxonomy = taxonomy_with([book]);

        let plan = InvalidationPlan::for_event(&saved(11), &taxonomy, &all_on(), 1);

        assert!(plan.delete.contains(&CacheKey::new("cache_archive_book")));
        assert!(!plan.delete.contains(&CacheKey::home()));
        assert!(!plan.delete.contains(&CacheKey::blog()));
    }

    #[test]
    fn later_listing_pages_are_included() {
        let taxonomy = taxonomy_with([post(42)]);
        let settings = CacheSettings {
            cache_blog: true,
            ..Default::default()
        };

        let plan = InvalidationPlan::for_event(&saved(42), &taxonomy, &settings, 3);

        assert_eq!(
            keys(&plan),
            vec!["cache_blog", "cache_blog_page_2", "cache_blog_page_3", "cache_post_42"]
        );
    }

    #[test]
    fn unknown_item_falls_back_to_both_own_keys() {
        let taxonomy = InMemoryTaxonomy::new();
        let settings = CacheSettings {
            cache_home: true,
            cache_archive: true,
            ..Default::default()
        };

        let plan = InvalidationPlan::for_event(
            &EventKind::ContentDeleted { item_id: 8 },
            &taxonomy,
            &settings,
            1,
        );

        assert_eq!(keys(&plan), vec!["cache_home", "cache_page_8", "cache_post_8"]);
    }

    #[test]
    fn unchanged_save_plans_nothing() {
        let taxonomy = taxonomy_with([post(42)]);
        let plan = InvalidationPlan::for_event(
            &EventKind::ContentSaved {
                item_id: 42,
                save: SaveKind::Unchanged,
            },
            &taxonomy,
            &all_on(),
            DEFAULT_PAGINATION_DEPTH,
        );

        assert!(plan.is_empty());
    }

    #[test]
    fn new_items_cascade_like_updates() {
        let taxonomy = taxonomy_with([post(42)]);
        let created = InvalidationPlan::for_event(
            &EventKind::ContentSaved {
                item_id: 42,
                save: SaveKind::Created,
            },
            &taxonomy,
            &all_on(),
            2,
        );
        let updated = InvalidationPlan::for_event(&saved(42), &taxonomy, &all_on(), 2);

        assert_eq!(created, updated);
    }

    #[test]
    fn comments_and_trash_cascade_like_saves() {
        let taxonomy = taxonomy_with([post(42)]);
        let expected = InvalidationPlan::for_event(&saved(42), &taxonomy, &all_on(), 1);

        for kind in [
            EventKind::CommentPosted { item_id: 42 },
            EventKind::ContentTrashed { item_id: 42 },
            EventKind::ContentDeleted { item_id: 42 },
        ] {
            assert_eq!(
                InvalidationPlan::for_event(&kind, &taxonomy, &all_on(), 1),
                expected,
                "{kind:?}"
            );
        }
    }

    #[test]
    fn site_wide_events_clear_everything() {
        let taxonomy = InMemoryTaxonomy::new();
        for kind in [
            EventKind::ThemeSwitched,
            EventKind::ClearRequested,
            EventKind::Deactivated,
            EventKind::Uninstalled,
        ] {
            let plan = InvalidationPlan::for_event(&kind, &taxonomy, &all_on(), 1);
            assert!(plan.clear_all);
            assert!(plan.delete.is_empty());
        }
    }

    #[test]
    fn display_format() {
        let plan = InvalidationPlan::default();
        let display = plan.to_string();
        assert!(display.contains("InvalidationPlan"));
        assert!(display.contains("delete: 0"));
    }
}
