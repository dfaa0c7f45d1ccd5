//! Debug-mode diagnostics.
//!
//! Diagnostics travel next to the response body, never inside it, so they can
//! not end up in a stored entry.

use std::fmt;

use time::OffsetDateTime;

use super::eligibility::BypassReason;
use super::keys::CacheKey;

/// Header a host can use to surface [`Diagnostics::header_value`].
pub const DIAGNOSTICS_HEADER: &str = "x-page-cache";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the store; rendering was skipped.
    Hit,
    /// Rendered and written to the store.
    Miss,
    /// Rendered, but nothing was stored (empty output or store failure).
    Uncached,
    /// Not eligible; rendered without touching the store.
    Bypass(BypassReason),
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => f.write_str("hit"),
            Self::Miss => f.write_str("miss"),
            Self::Uncached => f.write_str("uncached"),
            Self::Bypass(reason) => write!(f, "bypass ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub status: CacheStatus,
    /// Human-readable page classification.
    pub page: String,
    pub key: Option<CacheKey>,
    pub expires_at: Option<OffsetDateTime>,
}

impl Diagnostics {
    /// Single-line form suitable for a response header.
    pub fn header_value(&self) -> String {
        let mut value = format!("status={}; page={}", self.status, self.page);
        if let Some(key) = &self.key {
            value.push_str(&format!("; key={key}"));
        }
        if let Some(expires_at) = self.expires_at {
            value.push_str(&format!("; expires={}", expires_at.unix_timestamp()));
        }
        value
    }
}
