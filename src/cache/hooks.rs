//! Explicit wiring between the host and the cache.
//!
//! The host hands every render through [`Hooks::render`] and reports every
//! content change through the trigger methods. Interceptors and subscribers
//! are registered once at startup.

use std::cell::Cell;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::domain::page::{PageIdentity, Requester};

use super::diagnostics::{CacheStatus, Diagnostics};
use super::events::{CacheEvent, EventKind, SaveKind};

/// What the host knows about the request being rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub requester: Requester,
    pub identity: PageIdentity,
}

impl RenderRequest {
    pub fn anonymous(identity: PageIdentity) -> Self {
        Self {
            requester: Requester::Anonymous,
            identity,
        }
    }

    pub fn authenticated(identity: PageIdentity) -> Self {
        Self {
            requester: Requester::Authenticated,
            identity,
        }
    }
}

/// Bytes to send plus how they were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub body: Bytes,
    pub status: CacheStatus,
    /// Present only in debug mode.
    pub diagnostics: Option<Diagnostics>,
}

/// Produces the page when the cache cannot.
pub type RenderFn<'a> = Box<dyn FnOnce() -> Bytes + 'a>;

/// Wraps a render call and may skip it entirely.
pub trait RenderInterceptor: Send + Sync {
    fn around_render(&self, request: &RenderRequest, render: RenderFn<'_>) -> PageResponse;
}

/// Receives content-mutation events.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &CacheEvent);
}

/// Registry of interceptors and subscribers.
#[derive(Default)]
pub struct Hooks {
    interceptors: Vec<Arc<dyn RenderInterceptor>>,
    subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interceptors run outermost first, in registration order.
    ///
    /// An outer interceptor that reports [`CacheStatus::Uncached`] without
    /// diagnostics inherits both from the interceptor it wraps.
    pub fn register_interceptor(&mut self, interceptor: Arc<dyn RenderInterceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Render through every interceptor.
    pub fn render<F>(&self, request: &RenderRequest, render: F) -> PageResponse
    where
        F: FnOnce() -> Bytes,
    {
        run_chain(&self.interceptors, request, Box::new(render))
    }

    /// Deliver an event to every subscriber.
    pub fn publish(&self, kind: EventKind) {
        let event = CacheEvent::new(kind);

        info!(
            event_id = %event.id,
            event_kind = ?event.kind,
            subscribers = self.subscribers.len(),
            "Cache event published"
        );

        for subscriber in &self.subscribers {
            subscriber.on_event(&event);
        }
    }

    /// An item was created or saved.
    pub fn content_saved(&self, item_id: u64, save: SaveKind) {
        self.publish(EventKind::ContentSaved { item_id, save });
    }

    pub fn content_trashed(&self, item_id: u64) {
        self.publish(EventKind::ContentTrashed { item_id });
    }

    pub fn content_deleted(&self, item_id: u64) {
        self.publish(EventKind::ContentDeleted { item_id });
    }

    pub fn comment_posted(&self, item_id: u64) {
        self.publish(EventKind::CommentPosted { item_id });
    }

    pub fn theme_switched(&self) {
        self.publish(EventKind::ThemeSwitched);
    }

    pub fn clear_requested(&self) {
        self.publish(EventKind::ClearRequested);
    }

    pub fn deactivated(&self) {
        self.publish(EventKind::Deactivated);
    }

    pub fn uninstalled(&self) {
        self.publish(EventKind::Uninstalled);
    }
}

fn run_chain(
    interceptors: &[Arc<dyn RenderInterceptor>],
    request: &RenderRequest,
    render: RenderFn<'_>,
) -> PageResponse {
    match interceptors.split_first() {
        None => {
            debug!(page = %request.identity, "No render interceptor registered");
            PageResponse {
                body: render(),
                status: CacheStatus::Uncached,
                diagnostics: None,
            }
        }
        Some((outer, rest)) => {
            let inner: Cell<Option<(CacheStatus, Option<Diagnostics>)>> = Cell::new(None);
            let slot = &inner;
            let mut response = outer.around_render(
                request,
                Box::new(move || {
                    let response = run_chain(rest, request, render);
                    slot.set(Some((response.status, response.diagnostics)));
                    response.body
                }),
            );
            if response.status == CacheStatus::Uncached
                && response.diagnostics.is_none()
                && let Some((status, diagnostics)) = inner.take()
            {
                response.status = status;
                response.diagnostics = diagnostics;
            }
            response
        }
    }
}
