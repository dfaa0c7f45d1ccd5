//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::DEFAULT_PAGINATION_DEPTH;

mod cli;

pub use cli::{
    AdminArgs, CliArgs, Command, GlobalOverrides, InspectArgs, SettingsCommand, SettingsSaveArgs,
    TokenAction, TokenArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pagecache";
const ENV_PREFIX: &str = "PAGECACHE";
const DEFAULT_CACHE_DIR: &str = "page-cache";
const DEFAULT_SETTINGS_FILE: &str = "page-cache-settings.toml";
const MAX_PAGINATION_DEPTH: u32 = 1_000;
const MIN_TOKEN_SECRET_LEN: usize = 16;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache: CacheDeploymentSettings,
    pub logging: LoggingSettings,
    pub admin: AdminSettings,
}

#[derive(Debug, Clone)]
pub struct CacheDeploymentSettings {
    /// Directory holding one file per cached page.
    pub directory: PathBuf,
    /// TOML file holding the administrator's cache settings.
    pub settings_file: PathBuf,
    pub pagination_depth: u32,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Clone)]
pub struct AdminSettings {
    /// Secret mixed into replay-protection tokens; absent disables the admin surface.
    pub token_secret: Option<String>,
}

impl std::fmt::Debug for AdminSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSettings")
            .field("token_secret", &self.token_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    cache: RawCacheSettings,
    logging: RawLoggingSettings,
    admin: RawAdminSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(dir) = overrides.cache_dir.as_ref() {
            self.cache.directory = Some(dir.clone());
        }
        if let Some(file) = overrides.settings_file.as_ref() {
            self.cache.settings_file = Some(file.clone());
        }
        if let Some(depth) = overrides.pagination_depth {
            self.cache.pagination_depth = Some(depth);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            cache,
            logging,
            admin,
        } = raw;

        Ok(Self {
            cache: build_cache_settings(cache)?,
            logging: build_logging_settings(logging)?,
            admin: build_admin_settings(admin)?,
        })
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheDeploymentSettings, LoadError> {
    let directory = cache
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.directory",
            "path must not be empty",
        ));
    }

    let settings_file = cache
        .settings_file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    if settings_file.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.settings_file",
            "path must not be empty",
        ));
    }

    let pagination_depth = cache.pagination_depth.unwrap_or(DEFAULT_PAGINATION_DEPTH);
    if pagination_depth == 0 {
        return Err(LoadError::invalid(
            "cache.pagination_depth",
            "must be greater than zero",
        ));
    }
    if pagination_depth > MAX_PAGINATION_DEPTH {
        return Err(LoadError::invalid(
            "cache.pagination_depth",
            format!("must not exceed {MAX_PAGINATION_DEPTH}"),
        ));
    }

    Ok(CacheDeploymentSettings {
        directory,
        settings_file,
        pagination_depth,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_admin_settings(admin: RawAdminSettings) -> Result<AdminSettings, LoadError> {
    let token_secret = admin.token_secret.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    if let Some(secret) = token_secret.as_ref()
        && secret.len() < MIN_TOKEN_SECRET_LEN
    {
        return Err(LoadError::invalid(
            "admin.token_secret",
            format!("must be at least {MIN_TOKEN_SECRET_LEN} characters"),
        ));
    }

    Ok(AdminSettings { token_secret })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    directory: Option<PathBuf>,
    settings_file: Option<PathBuf>,
    pagination_depth: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdminSettings {
    token_secret: Option<String>,
}
