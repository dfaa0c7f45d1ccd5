//! Content-mutation events.
//!
//! The host reports every change that can make a cached page stale; the
//! invalidation coordinator turns each event into deletions.

use time::OffsetDateTime;
use uuid::Uuid;

/// How a save changed the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    Created,
    Updated,
    /// A save that changed nothing, such as an autosave of an untouched draft.
    Unchanged,
}

/// Types of events that trigger invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    // Content
    /// An item was created or saved.
    ContentSaved { item_id: u64, save: SaveKind },
    /// An item was moved to the trash.
    ContentTrashed { item_id: u64 },
    /// An item was permanently deleted.
    ContentDeleted { item_id: u64 },
    /// A comment was posted on an item.
    CommentPosted { item_id: u64 },

    // Site-wide
    /// The active theme changed; every rendered page may differ.
    ThemeSwitched,
    /// An administrator asked for the whole cache to be cleared.
    ClearRequested,
    /// The cache was switched off for the site.
    Deactivated,
    /// The cache is being removed from the site.
    Uninstalled,
}

impl EventKind {
    /// Item whose pages are affected, for per-item events.
    pub fn item_id(&self) -> Option<u64> {
        match self {
            Self::ContentSaved { item_id, .. }
            | Self::ContentTrashed { item_id }
            | Self::ContentDeleted { item_id }
            | Self::CommentPosted { item_id } => Some(*item_id),
            Self::ThemeSwitched | Self::ClearRequested | Self::Deactivated | Self::Uninstalled => {
                None
            }
        }
    }

    /// Whether the event invalidates every entry at once.
    pub fn clears_everything(&self) -> bool {
        self.item_id().is_none()
    }
}

/// An event as delivered to subscribers.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier, carried into logs and reports.
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}
