//! Administrative actions on the page cache.
//!
//! Every action needs an administrator principal and a replay-protection token
//! issued for that action and user. A rejected request changes nothing.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::cache::{
    CacheEvent, CacheSettings, Clock, DEFAULT_TTL_SECONDS, EventKind, InvalidationCoordinator,
    InvalidationReport, SharedSettings,
};
use crate::infra::settings_store::{SettingsStore, SettingsStoreError};

/// Lifetime of one token tick; a token stays valid for one to two ticks.
pub const TOKEN_TICK_SECONDS: i64 = 43_200;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("administrator privileges required")]
    Unauthorized,
    #[error("invalid or expired action token")]
    InvalidToken,
    #[error(transparent)]
    Settings(#[from] SettingsStoreError),
}

/// The user behind an administrative request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal {
    pub user_id: u64,
    pub can_manage_options: bool,
}

impl AdminPrincipal {
    pub fn administrator(user_id: u64) -> Self {
        Self {
            user_id,
            can_manage_options: true,
        }
    }

    fn require_admin(&self) -> Result<(), AdminError> {
        if self.can_manage_options {
            Ok(())
        } else {
            Err(AdminError::Unauthorized)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    SaveSettings,
    ClearCache,
}

impl AdminAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SaveSettings => "pagecache_save_settings",
            Self::ClearCache => "pagecache_clear_cache",
        }
    }
}

/// Issues and checks per-action, per-user tokens.
pub struct ActionTokens {
    secret: String,
    clock: Arc<dyn Clock>,
}

impl ActionTokens {
    pub fn new(secret: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            clock,
        }
    }

    pub fn issue(&self, action: AdminAction, user_id: u64) -> String {
        self.compute(action, user_id, self.tick())
    }

    /// Accepts tokens from the current and the previous tick.
    pub fn verify(&self, action: AdminAction, user_id: u64, token: &str) -> bool {
        let tick = self.tick();
        [tick, tick - 1].into_iter().any(|candidate| {
            let expected = self.compute(action, user_id, candidate);
            bool::from(expected.as_bytes().ct_eq(token.as_bytes()))
        })
    }

    fn tick(&self) -> i64 {
        self.clock.now().unix_timestamp().div_euclid(TOKEN_TICK_SECONDS)
    }

    fn compute(&self, action: AdminAction, user_id: u64, tick: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"|");
        hasher.update(action.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(user_id.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(tick.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Raw values of the settings form, as submitted.
///
/// Checkboxes are present only when ticked, whatever value they carry; every
/// field is free text.
#[derive(Debug, Clone, Default)]
pub struct SettingsForm {
    pub cache_home: Option<String>,
    pub cache_blog: Option<String>,
    pub cache_archive: Option<String>,
    pub cache_page: Option<String>,
    pub debug_mode: Option<String>,
    pub ttl_seconds: Option<String>,
}

impl SettingsForm {
    /// A form that would save `settings` unchanged.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let ticked = |on: bool| on.then(|| "1".to_string());
        Self {
            cache_home: ticked(settings.cache_home),
            cache_blog: ticked(settings.cache_blog),
            cache_archive: ticked(settings.cache_archive),
            cache_page: ticked(settings.cache_page),
            debug_mode: ticked(settings.debug_mode),
            ttl_seconds: Some(settings.ttl_seconds.to_string()),
        }
    }

    /// Interpret the form; a submitted checkbox is on, a missing one is off.
    pub fn to_settings(&self) -> CacheSettings {
        let ttl = match self.ttl_seconds.as_deref() {
            Some(raw) => CacheSettings::clamp_ttl(parse_leading_integer(raw)),
            None => DEFAULT_TTL_SECONDS,
        };

        CacheSettings {
            cache_home: checkbox(&self.cache_home),
            cache_blog: checkbox(&self.cache_blog),
            cache_archive: checkbox(&self.cache_archive),
            cache_page: checkbox(&self.cache_page),
            debug_mode: checkbox(&self.debug_mode),
            ttl_seconds: ttl,
        }
    }
}

fn checkbox(value: &Option<String>) -> bool {
    value.is_some()
}

/// Magnitude of the leading integer in `raw`; no digits count as 0.
fn parse_leading_integer(raw: &str) -> u64 {
    let trimmed = raw.trim_start();
    let unsigned = trimmed
        .strip_prefix(['+', '-'])
        .unwrap_or(trimmed);
    let digits: &str = {
        let end = unsigned
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(unsigned.len());
        &unsigned[..end]
    };
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(u64::MAX)
}

pub struct AdminService {
    settings_store: Arc<dyn SettingsStore>,
    settings: SharedSettings,
    coordinator: Arc<InvalidationCoordinator>,
    tokens: ActionTokens,
}

impl AdminService {
    pub fn new(
        settings_store: Arc<dyn SettingsStore>,
        settings: SharedSettings,
        coordinator: Arc<InvalidationCoordinator>,
        tokens: ActionTokens,
    ) -> Self {
        Self {
            settings_store,
            settings,
            coordinator,
            tokens,
        }
    }

    pub fn tokens(&self) -> &ActionTokens {
        &self.tokens
    }

    /// Persist the submitted settings and apply them to later requests.
    #[instrument(skip_all, fields(user_id = principal.user_id))]
    pub fn save_settings(
        &self,
        principal: &AdminPrincipal,
        token: &str,
        form: &SettingsForm,
    ) -> Result<CacheSettings, AdminError> {
        self.authorize(principal, AdminAction::SaveSettings, token)?;

        let settings = form.to_settings();
        self.settings_store.save(&settings)?;
        self.settings.replace(settings.clone());

        info!(
            op = "admin::save_settings",
            cache_home = settings.cache_home,
            cache_blog = settings.cache_blog,
            cache_archive = settings.cache_archive,
            cache_page = settings.cache_page,
            debug_mode = settings.debug_mode,
            ttl_seconds = settings.ttl_seconds,
            "Cache settings updated"
        );
        Ok(settings)
    }

    /// Remove every cached page.
    #[instrument(skip_all, fields(user_id = principal.user_id))]
    pub fn clear_cache(
        &self,
        principal: &AdminPrincipal,
        token: &str,
    ) -> Result<InvalidationReport, AdminError> {
        self.authorize(principal, AdminAction::ClearCache, token)?;

        let report = self
            .coordinator
            .handle(&CacheEvent::new(EventKind::ClearRequested));
        info!(
            op = "admin::clear_cache",
            cleared = ?report.cleared,
            complete = report.is_complete(),
            "Cache cleared by administrator"
        );
        Ok(report)
    }

    fn authorize(
        &self,
        principal: &AdminPrincipal,
        action: AdminAction,
        token: &str,
    ) -> Result<(), AdminError> {
        if let Err(err) = principal.require_admin() {
            warn!(action = action.as_str(), "Rejected admin action: not an administrator");
            return Err(err);
        }
        if !self.tokens.verify(action, principal.user_id, token) {
            warn!(action = action.as_str(), "Rejected admin action: bad token");
            return Err(AdminError::InvalidToken);
        }
        Ok(())
    }
}
