//! Invalidation coordinator.
//!
//! Executes the plan for each mutation event against the store. Individual
//! deletion failures are logged and skipped; the report lists them.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::content::ContentTaxonomy;

use super::config::SharedSettings;
use super::events::CacheEvent;
use super::hooks::EventSubscriber;
use super::keys::CacheKey;
use super::planner::{DEFAULT_PAGINATION_DEPTH, InvalidationPlan};
use super::store::{CacheStore, StoreError};

const METRIC_INVALIDATED_KEYS: &str = "pagecache_invalidated_keys_total";
const METRIC_CLEAR: &str = "pagecache_clear_total";
const METRIC_STORE_ERROR: &str = "pagecache_store_error_total";
const METRIC_INVALIDATE_MS: &str = "pagecache_invalidate_ms";

/// What handling one event did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationReport {
    pub event_id: Uuid,
    /// Individual deletions attempted.
    pub keys_attempted: usize,
    /// Keys whose deletion failed.
    pub failed: Vec<CacheKey>,
    /// Entries removed by a full clear, if the event cleared everything.
    pub cleared: Option<usize>,
    /// A full clear left entries behind or could not run.
    pub clear_incomplete: bool,
    /// The event required no work.
    pub skipped: bool,
}

impl InvalidationReport {
    fn new(event_id: Uuid) -> Self {
        Self {
            event_id,
            keys_attempted: 0,
            failed: Vec::new(),
            cleared: None,
            clear_incomplete: false,
            skipped: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.clear_incomplete
    }
}

pub struct InvalidationCoordinator {
    store: Arc<dyn CacheStore>,
    settings: SharedSettings,
    taxonomy: Arc<dyn ContentTaxonomy>,
    pagination_depth: u32,
}

impl InvalidationCoordinator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        settings: SharedSettings,
        taxonomy: Arc<dyn ContentTaxonomy>,
    ) -> Self {
        Self {
            store,
            settings,
            taxonomy,
            pagination_depth: DEFAULT_PAGINATION_DEPTH,
        }
    }

    /// Number of listing pages removed per aggregate key; 1 removes only the first.
    pub fn with_pagination_depth(mut self, depth: u32) -> Self {
        self.pagination_depth = depth.max(1);
        self
    }

    /// Plan and execute the deletions for one event.
    #[instrument(skip_all, fields(event_id = %event.id))]
    pub fn handle(&self, event: &CacheEvent) -> InvalidationReport {
        let started_at = Instant::now();
        let settings = self.settings.snapshot();
        let plan = InvalidationPlan::for_event(
            &event.kind,
            self.taxonomy.as_ref(),
            &settings,
            self.pagination_depth,
        );

        let mut report = InvalidationReport::new(event.id);
        if plan.is_empty() {
            report.skipped = true;
            info!(event_kind = ?event.kind, "Invalidation skipped: nothing to delete");
            return report;
        }

        info!(event_kind = ?event.kind, plan = %plan, "Invalidation starting");

        if plan.clear_all {
            self.clear(&mut report);
        }

        for key in &plan.delete {
            report.keys_attempted += 1;
            if let Err(err) = self.store.delete(key) {
                counter!(METRIC_STORE_ERROR, "op" => "delete").increment(1);
                warn!(cache_key = %key, error = %err, "Failed to delete cache entry");
                report.failed.push(key.clone());
            }
        }

        let deleted = report.keys_attempted - report.failed.len();
        counter!(METRIC_INVALIDATED_KEYS).increment(deleted as u64);

        info!(
            attempted = report.keys_attempted,
            failed = report.failed.len(),
            cleared = ?report.cleared,
            "Invalidation complete"
        );
        histogram!(METRIC_INVALIDATE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        report
    }

    fn clear(&self, report: &mut InvalidationReport) {
        counter!(METRIC_CLEAR).increment(1);
        match self.store.clear_all() {
            Ok(removed) => report.cleared = Some(removed),
            Err(StoreError::Incomplete { removed, failed }) => {
                counter!(METRIC_STORE_ERROR, "op" => "clear_all").increment(1);
                warn!(removed, failed, "Cache clear left entries behind");
                report.cleared = Some(removed);
                report.clear_incomplete = true;
            }
            Err(err) => {
                counter!(METRIC_STORE_ERROR, "op" => "clear_all").increment(1);
                warn!(error = %err, "Cache clear failed");
                report.clear_incomplete = true;
            }
        }
    }
}

impl EventSubscriber for InvalidationCoordinator {
    fn on_event(&self, event: &CacheEvent) {
        let report = self.handle(event);
        if !report.is_complete() {
            warn!(
                event_id = %report.event_id,
                failed = report.failed.len(),
                "Invalidation finished with failures"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use bytes::Bytes;
    use time::OffsetDateTime;
    use time::macros::date;

    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::config::CacheSettings;
    use crate::cache::events::{EventKind, SaveKind};
    use crate::cache::store::MemoryStore;
    use crate::domain::content::{ContentItem, InMemoryTaxonomy};

    struct Fixture {
        store: Arc<MemoryStore>,
        taxonomy: Arc<InMemoryTaxonomy>,
        coordinator: InvalidationCoordinator,
    }

    fn fixture(settings: CacheSettings) -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(MemoryStore::new(
            NonZeroUsize::new(256).expect("capacity"),
            clock,
        ));
        let taxonomy = Arc::new(InMemoryTaxonomy::new());
        let coordinator = InvalidationCoordinator::new(
            store.clone(),
            SharedSettings::new(settings),
            taxonomy.clone(),
        )
        .with_pagination_depth(1);
        Fixture {
            store,
            taxonomy,
            coordinator,
        }
    }

    fn post(id: u64) -> ContentItem {
        ContentItem {
            id,
            post_type: "post".to_string(),
            author_id: 5,
            published_on: date!(2024 - 03 - 09),
            categories: vec![7],
            tags: vec![],
            terms: vec![],
        }
    }

    fn seed(store: &MemoryStore, keys: &[&str]) {
        for key in keys {
            store
                .set(&CacheKey::new(*key), key.as_bytes(), 600)
                .expect("seed entry");
        }
    }

    /// Store whose deletions fail for one key.
    struct FailingDelete {
        inner: MemoryStore,
        broken: CacheKey,
    }

    impl CacheStore for FailingDelete {
        fn get(&self, key: &CacheKey) -> Option<Bytes> {
            self.inner.get(key)
        }

        fn set(&self, key: &CacheKey, content: &[u8], ttl: u32) -> Result<(), StoreError> {
            self.inner.set(key, content, ttl)
        }

        fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
            if *key == self.broken {
                return Err(StoreError::Delete {
                    key: key.clone(),
                    source: std::io::Error::other("permission denied"),
                });
            }
            self.inner.delete(key)
        }

        fn clear_all(&self) -> Result<usize, StoreError> {
            Err(StoreError::Incomplete {
                removed: 2,
                failed: 1,
            })
        }

        fn expiration_of(&self, key: &CacheKey) -> Option<OffsetDateTime> {
            self.inner.expiration_of(key)
        }
    }

    #[test]
    fn update_removes_item_and_listings_only() {
        let fx = fixture(CacheSettings {
            cache_home: true,
            cache_blog: true,
            cache_archive: true,
            ..Default::default()
        });
        fx.taxonomy.upsert(post(42));
        seed(
            &fx.store,
            &[
                "cache_post_42",
                "cache_home",
                "cache_blog",
                "cache_category_7",
                "cache_author_5",
                "cache_date_2024_03",
                "cache_archive_post",
                "cache_post_99",
            ],
        );

        let report = fx.coordinator.handle(&CacheEvent::new(EventKind::ContentSaved {
            item_id: 42,
            save: SaveKind::Updated,
        }));

        assert!(report.is_complete());
        assert!(!report.skipped);
        for gone in [
            "cache_post_42",
            "cache_home",
            "cache_blog",
            "cache_category_7",
            "cache_author_5",
            "cache_date_2024_03",
            "cache_archive_post",
        ] {
            assert!(fx.store.get(&CacheKey::new(gone)).is_none(), "{gone}");
        }
        assert!(fx.store.get(&CacheKey::single(99)).is_some());
    }

    #[test]
    fn theme_switch_clears_everything() {
        let fx = fixture(CacheSettings::default());
        seed(&fx.store, &["cache_post_1", "cache_post_2", "cache_home"]);

        let report = fx
            .coordinator
            .handle(&CacheEvent::new(EventKind::ThemeSwitched));

        assert_eq!(report.cleared, Some(3));
        assert_eq!(report.keys_attempted, 0);
        assert!(fx.store.is_empty());
    }

    #[test]
    fn unchanged_save_is_skipped() {
        let fx = fixture(CacheSettings::default());
        fx.taxonomy.upsert(post(42));
        seed(&fx.store, &["cache_post_42"]);

        let report = fx.coordinator.handle(&CacheEvent::new(EventKind::ContentSaved {
            item_id: 42,
            save: SaveKind::Unchanged,
        }));

        assert!(report.skipped);
        assert!(fx.store.get(&CacheKey::single(42)).is_some());
    }

    #[test]
    fn failed_deletion_does_not_stop_cascade() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(FailingDelete {
            inner: MemoryStore::new(NonZeroUsize::new(16).expect("capacity"), clock),
            broken: CacheKey::home(),
        });
        let taxonomy = Arc::new(InMemoryTaxonomy::new());
        taxonomy.upsert(post(42));
        let coordinator = InvalidationCoordinator::new(
            store.clone(),
            SharedSettings::new(CacheSettings {
                cache_home: true,
                cache_blog: true,
                ..Default::default()
            }),
            taxonomy,
        )
        .with_pagination_depth(1);
        seed(&store.inner, &["cache_post_42", "cache_home", "cache_blog"]);

        let report = coordinator.handle(&CacheEvent::new(EventKind::CommentPosted { item_id: 42 }));

        assert_eq!(report.keys_attempted, 3);
        assert_eq!(report.failed, vec![CacheKey::home()]);
        assert!(store.get(&CacheKey::blog()).is_none());
        assert!(store.get(&CacheKey::single(42)).is_none());
    }

    #[test]
    fn incomplete_clear_is_reported() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(FailingDelete {
            inner: MemoryStore::new(NonZeroUsize::new(4).expect("capacity"), clock),
            broken: CacheKey::home(),
        });
        let coordinator = InvalidationCoordinator::new(
            store,
            SharedSettings::default(),
            Arc::new(InMemoryTaxonomy::new()),
        );

        let report = coordinator.handle(&CacheEvent::new(EventKind::ClearRequested));

        assert_eq!(report.cleared, Some(2));
        assert!(report.clear_incomplete);
        assert!(!report.is_complete());
    }

    #[test]
    fn subscriber_handles_published_events() {
        let fx = fixture(CacheSettings::default());
        seed(&fx.store, &["cache_post_3"]);

        let mut hooks = crate::cache::hooks::Hooks::new();
        let coordinator: Arc<dyn EventSubscriber> = Arc::new(fx.coordinator);
        hooks.subscribe(coordinator);
        hooks.content_trashed(3);

        assert!(fx.store.is_empty());
    }
}
