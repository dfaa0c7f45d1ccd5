//! Persistence of the administrator's cache settings.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::CacheSettings;
use crate::cache::lock::mutex_lock;

const SOURCE: &str = "infra::settings_store";

#[derive(Debug, Error)]
pub enum SettingsStoreError {
    #[error("failed to read settings from `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write settings to `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove settings at `{path}`: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings file `{path}`: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Load/save/remove of the single settings record.
pub trait SettingsStore: Send + Sync {
    /// The persisted record, sanitized; `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<CacheSettings>, SettingsStoreError>;

    fn save(&self, settings: &CacheSettings) -> Result<(), SettingsStoreError>;

    /// Forget the record; removing a missing record succeeds.
    fn remove(&self) -> Result<(), SettingsStoreError>;

    /// The persisted record, or defaults when none exists or it cannot be decoded.
    fn load_or_default(&self) -> Result<CacheSettings, SettingsStoreError> {
        match self.load() {
            Ok(settings) => Ok(settings.unwrap_or_default()),
            Err(err @ SettingsStoreError::Decode { .. }) => {
                warn!(
                    op = "settings_store::load_or_default",
                    error = %err,
                    "Persisted settings unreadable; using defaults"
                );
                Ok(CacheSettings::default())
            }
            Err(err) => Err(err),
        }
    }
}

/// Settings kept in one TOML file, replaced atomically on save.
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: io::Error) -> SettingsStoreError {
        SettingsStoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Option<CacheSettings>, SettingsStoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SettingsStoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let settings: CacheSettings =
            toml::from_str(&data).map_err(|source| SettingsStoreError::Decode {
                path: self.path.clone(),
                source,
            })?;
        let sanitized = settings.clone().sanitized();
        if sanitized != settings {
            warn!(
                op = "settings_store::load",
                path = %self.path.display(),
                ttl_seconds = settings.ttl_seconds,
                "Persisted TTL out of range; clamped"
            );
        }
        Ok(Some(sanitized))
    }

    fn save(&self, settings: &CacheSettings) -> Result<(), SettingsStoreError> {
        let encoded = toml::to_string_pretty(&settings.clone().sanitized())?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|source| self.write_err(source))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|source| self.write_err(source))?;
        tmp.write_all(encoded.as_bytes())
            .map_err(|source| self.write_err(source))?;
        tmp.persist(&self.path)
            .map_err(|err| self.write_err(err.error))?;

        info!(
            op = "settings_store::save",
            path = %self.path.display(),
            "Cache settings saved"
        );
        Ok(())
    }

    fn remove(&self) -> Result<(), SettingsStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(
                    op = "settings_store::remove",
                    path = %self.path.display(),
                    "Cache settings removed"
                );
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SettingsStoreError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// In-process settings record.
#[derive(Default)]
pub struct MemorySettingsStore {
    record: Mutex<Option<CacheSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: CacheSettings) -> Self {
        Self {
            record: Mutex::new(Some(settings.sanitized())),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Option<CacheSettings>, SettingsStoreError> {
        Ok(mutex_lock(&self.record, SOURCE, "load").clone())
    }

    fn save(&self, settings: &CacheSettings) -> Result<(), SettingsStoreError> {
        *mutex_lock(&self.record, SOURCE, "save") = Some(settings.clone().sanitized());
        Ok(())
    }

    fn remove(&self) -> Result<(), SettingsStoreError> {
        mutex_lock(&self.record, SOURCE, "remove").take();
        Ok(())
    }
}
