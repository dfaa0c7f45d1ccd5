//! Cache configuration.
//!
//! The record the administrator edits: which page types are cached, how long
//! entries live and whether diagnostics are emitted.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::lock::{rw_read, rw_write};

pub const MIN_TTL_SECONDS: u32 = 60;
pub const MAX_TTL_SECONDS: u32 = 86_400;
pub const DEFAULT_TTL_SECONDS: u32 = 3_600;

const SOURCE: &str = "cache::config";

/// Page-type switches, TTL and debug mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache the front page.
    pub cache_home: bool,
    /// Cache the posts listing page.
    pub cache_blog: bool,
    /// Cache category, tag, author, date, taxonomy and post-type archives.
    pub cache_archive: bool,
    /// Cache static pages other than the front page.
    pub cache_page: bool,
    /// Attach diagnostics to responses.
    pub debug_mode: bool,
    /// Entry lifetime, always within `[MIN_TTL_SECONDS, MAX_TTL_SECONDS]` once sanitized.
    pub ttl_seconds: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_home: false,
            cache_blog: false,
            cache_archive: false,
            cache_page: false,
            debug_mode: false,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

impl CacheSettings {
    /// Clamp a requested TTL into the supported range.
    pub fn clamp_ttl(requested: u64) -> u32 {
        requested.clamp(u64::from(MIN_TTL_SECONDS), u64::from(MAX_TTL_SECONDS)) as u32
    }

    /// Returns the record with its TTL clamped.
    pub fn sanitized(mut self) -> Self {
        self.ttl_seconds = Self::clamp_ttl(u64::from(self.ttl_seconds));
        self
    }
}

/// Process-wide settings handle.
///
/// Readers take a snapshot per request; only the admin save path replaces it.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<CacheSettings>>,
}

impl SharedSettings {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings.sanitized())),
        }
    }

    pub fn snapshot(&self) -> CacheSettings {
        rw_read(&self.inner, SOURCE, "snapshot").clone()
    }

    pub fn replace(&self, settings: CacheSettings) {
        *rw_write(&self.inner, SOURCE, "replace") = settings.sanitized();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let settings = CacheSettings::default();
        assert!(!settings.cache_home);
        assert!(!settings.cache_blog);
        assert!(!settings.cache_archive);
        assert!(!settings.cache_page);
        assert!(!settings.debug_mode);
        assert_eq!(settings.ttl_seconds, 3600);
    }

    #[test]
    fn ttl_is_clamped_into_range() {
        assert_eq!(CacheSettings::clamp_ttl(5), 60);
        assert_eq!(CacheSettings::clamp_ttl(0), 60);
        assert_eq!(CacheSettings::clamp_ttl(999_999), 86_400);
        assert_eq!(CacheSettings::clamp_ttl(u64::MAX), 86_400);
        assert_eq!(CacheSettings::clamp_ttl(900), 900);
    }

    #[test]
    fn sanitized_clamps_stored_ttl() {
        let settings = CacheSettings {
            ttl_seconds: 10,
            ..Default::default()
        };
        assert_eq!(settings.sanitized().ttl_seconds, 60);
    }

    #[test]
    fn missing_fields_default_off() {
        let settings: CacheSettings =
            serde_json::from_str(r#"{"cache_home": true}"#).expect("partial record parses");
        assert!(settings.cache_home);
        assert!(!settings.cache_blog);
        assert_eq!(settings.ttl_seconds, DEFAULT_TTL_SECONDS);
    }

    #[test]
    fn shared_settings_replace_is_visible_to_snapshots() {
        let shared = SharedSettings::new(CacheSettings::default());
        let reader = shared.clone();

        shared.replace(CacheSettings {
            cache_blog: true,
            ttl_seconds: 1,
            ..Default::default()
        });

        let snapshot = reader.snapshot();
        assert!(snapshot.cache_blog);
        assert_eq!(snapshot.ttl_seconds, 60);
    }
}
