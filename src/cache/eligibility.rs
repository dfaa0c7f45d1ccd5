//! Which requests may be served from and written to the cache.

use std::fmt;

use crate::domain::page::{PageIdentity, PageKind, Requester};

use super::config::CacheSettings;

/// Why a request bypasses the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BypassReason {
    /// Logged-in visitors always get a fresh render.
    LoggedIn,
    /// The page type is switched off in the settings.
    PageTypeDisabled,
    /// The request is not a cacheable page type at all.
    Unclassified,
}

impl BypassReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoggedIn => "logged_in",
            Self::PageTypeDisabled => "page_type_disabled",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Bypass(BypassReason),
}

impl Eligibility {
    /// Decide eligibility; depends only on its arguments.
    ///
    /// Pagination never matters here, it only changes the key.
    pub fn evaluate(
        requester: Requester,
        identity: &PageIdentity,
        settings: &CacheSettings,
    ) -> Self {
        if requester.is_authenticated() {
            return Self::Bypass(BypassReason::LoggedIn);
        }

        let enabled = match identity.kind {
            PageKind::Single { .. } => true,
            PageKind::Front => settings.cache_home,
            PageKind::Blog => settings.cache_blog,
            PageKind::Archive(_) => settings.cache_archive,
            PageKind::StaticPage { .. } => settings.cache_page,
            PageKind::Unclassified => return Self::Bypass(BypassReason::Unclassified),
        };

        if enabled {
            Self::Eligible
        } else {
            Self::Bypass(BypassReason::PageTypeDisabled)
        }
    }

    pub fn is_eligible(self) -> bool {
        matches!(self, Self::Eligible)
    }
}
