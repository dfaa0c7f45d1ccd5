//! Activation, deactivation and removal of the page cache for a site.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{CacheSettings, Hooks, SharedSettings};
use crate::infra::settings_store::{SettingsStore, SettingsStoreError};

use super::error::AppError;

pub struct Lifecycle {
    hooks: Arc<Hooks>,
    settings_store: Arc<dyn SettingsStore>,
    settings: SharedSettings,
}

impl Lifecycle {
    pub fn new(
        hooks: Arc<Hooks>,
        settings_store: Arc<dyn SettingsStore>,
        settings: SharedSettings,
    ) -> Self {
        Self {
            hooks,
            settings_store,
            settings,
        }
    }

    /// Load the persisted settings, writing defaults on first activation.
    ///
    /// An unreadable record is left in place and defaults apply until the
    /// next save.
    pub fn activate(&self) -> Result<CacheSettings, AppError> {
        let settings = match self.settings_store.load() {
            Ok(Some(existing)) => existing,
            Ok(None) => {
                let defaults = CacheSettings::default();
                self.settings_store.save(&defaults)?;
                info!(op = "lifecycle::activate", "Persisted default cache settings");
                defaults
            }
            Err(err @ SettingsStoreError::Decode { .. }) => {
                warn!(
                    op = "lifecycle::activate",
                    error = %err,
                    "Persisted settings unreadable; activating with defaults"
                );
                CacheSettings::default()
            }
            Err(err) => return Err(err.into()),
        };
        self.settings.replace(settings.clone());
        Ok(settings)
    }

    /// Drop every cached page; persisted settings are kept.
    pub fn deactivate(&self) {
        self.hooks.deactivated();
    }

    /// Drop every cached page and forget the persisted settings.
    pub fn uninstall(&self) -> Result<(), AppError> {
        self.hooks.uninstalled();
        self.settings_store.remove()?;
        self.settings.replace(CacheSettings::default());
        info!(op = "lifecycle::uninstall", "Page cache uninstalled");
        Ok(())
    }
}
