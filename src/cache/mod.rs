//! Page cache.
//!
//! Stores the rendered bytes of public pages and serves them to later
//! anonymous visitors without rendering again:
//!
//! - **Controller**: read-through around the host's render call
//! - **Coordinator**: deletes stale entries when content changes
//! - **Stores**: one file per entry on disk, or an LRU map in memory
//!
//! ## Configuration
//!
//! Which page types are cached is an administrator setting
//! ([`CacheSettings`]), persisted through the settings store:
//!
//! ```toml
//! cache_home = true
//! cache_blog = true
//! cache_archive = false
//! cache_page = false
//! debug_mode = false
//! ttl_seconds = 3600
//! ```

mod clock;
mod config;
mod controller;
mod coordinator;
mod diagnostics;
mod eligibility;
mod events;
mod file_store;
mod hooks;
mod keys;
pub(crate) mod lock;
mod planner;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CacheSettings, DEFAULT_TTL_SECONDS, MAX_TTL_SECONDS, MIN_TTL_SECONDS, SharedSettings,
};
pub use controller::PageCacheController;
pub use coordinator::{InvalidationCoordinator, InvalidationReport};
pub use diagnostics::{CacheStatus, DIAGNOSTICS_HEADER, Diagnostics};
pub use eligibility::{BypassReason, Eligibility};
pub use events::{CacheEvent, EventKind, SaveKind};
pub use file_store::{FileStore, MARKER_FILE};
pub use hooks::{
    EventSubscriber, Hooks, PageResponse, RenderFn, RenderInterceptor, RenderRequest,
};
pub use keys::CacheKey;
pub use planner::{DEFAULT_PAGINATION_DEPTH, InvalidationPlan};
pub use store::{CacheStore, MemoryStore, StoreError};
