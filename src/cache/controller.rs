//! Read-through page cache.
//!
//! A hit returns the stored bytes without rendering. A miss renders once,
//! stores one copy and returns it. Caching problems never fail the request:
//! the rendered page is always delivered.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, instrument, warn};

use super::clock::Clock;
use super::config::{CacheSettings, SharedSettings};
use super::diagnostics::{CacheStatus, Diagnostics};
use super::eligibility::{BypassReason, Eligibility};
use super::hooks::{PageResponse, RenderFn, RenderInterceptor, RenderRequest};
use super::keys::CacheKey;
use super::store::{CacheStore, expiry_after};

const METRIC_HIT: &str = "pagecache_hit_total";
const METRIC_MISS: &str = "pagecache_miss_total";
const METRIC_BYPASS: &str = "pagecache_bypass_total";
const METRIC_STORE_ERROR: &str = "pagecache_store_error_total";

pub struct PageCacheController {
    store: Arc<dyn CacheStore>,
    settings: SharedSettings,
    clock: Arc<dyn Clock>,
}

impl PageCacheController {
    pub fn new(store: Arc<dyn CacheStore>, settings: SharedSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            settings,
            clock,
        }
    }

    /// Serve `request`, calling `render` only when the cache cannot answer.
    #[instrument(skip_all, fields(page = %request.identity))]
    pub fn serve<F>(&self, request: &RenderRequest, render: F) -> PageResponse
    where
        F: FnOnce() -> Bytes,
    {
        let settings = self.settings.snapshot();

        if let Eligibility::Bypass(reason) =
            Eligibility::evaluate(request.requester, &request.identity, &settings)
        {
            return self.bypass(request, &settings, reason, render);
        }

        let Some(key) = CacheKey::for_page(&request.identity) else {
            return self.bypass(request, &settings, BypassReason::Unclassified, render);
        };

        if let Some(body) = self.store.get(&key) {
            counter!(METRIC_HIT).increment(1);
            debug!(cache_key = %key, outcome = "hit", "Serving cached page");
            let diagnostics = settings.debug_mode.then(|| Diagnostics {
                status: CacheStatus::Hit,
                page: request.identity.to_string(),
                expires_at: self.store.expiration_of(&key),
                key: Some(key),
            });
            return PageResponse {
                body,
                status: CacheStatus::Hit,
                diagnostics,
            };
        }

        counter!(METRIC_MISS).increment(1);
        let render_started_at = Instant::now();
        let body = render();
        let render_ms = render_started_at.elapsed().as_millis() as u64;

        let status = if body.is_empty() {
            debug!(cache_key = %key, outcome = "miss", render_ms, "Rendered page is empty; not caching");
            CacheStatus::Uncached
        } else {
            match self.store.set(&key, &body, settings.ttl_seconds) {
                Ok(()) => {
                    debug!(
                        cache_key = %key,
                        outcome = "miss",
                        render_ms,
                        bytes = body.len(),
                        ttl_seconds = settings.ttl_seconds,
                        "Cached rendered page"
                    );
                    CacheStatus::Miss
                }
                Err(err) => {
                    counter!(METRIC_STORE_ERROR, "op" => "set").increment(1);
                    warn!(
                        cache_key = %key,
                        outcome = "miss",
                        error = %err,
                        "Failed to store rendered page; serving uncached"
                    );
                    CacheStatus::Uncached
                }
            }
        };

        let diagnostics = settings.debug_mode.then(|| Diagnostics {
            status,
            page: request.identity.to_string(),
            expires_at: (status == CacheStatus::Miss)
                .then(|| expiry_after(self.clock.now(), settings.ttl_seconds)),
            key: Some(key),
        });

        PageResponse {
            body,
            status,
            diagnostics,
        }
    }

    fn bypass<F>(
        &self,
        request: &RenderRequest,
        settings: &CacheSettings,
        reason: BypassReason,
        render: F,
    ) -> PageResponse
    where
        F: FnOnce() -> Bytes,
    {
        counter!(METRIC_BYPASS, "reason" => reason.as_str()).increment(1);
        debug!(outcome = "bypass", reason = %reason, "Rendering without cache");

        let status = CacheStatus::Bypass(reason);
        PageResponse {
            body: render(),
            status,
            diagnostics: settings.debug_mode.then(|| Diagnostics {
                status,
                page: request.identity.to_string(),
                key: None,
                expires_at: None,
            }),
        }
    }
}

impl RenderInterceptor for PageCacheController {
    fn around_render(&self, request: &RenderRequest, render: RenderFn<'_>) -> PageResponse {
        self.serve(request, render)
    }
}
