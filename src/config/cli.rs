use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the pagecache binary.
#[derive(Debug, Parser)]
#[command(name = "pagecache", version, about = "Page cache administration")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PAGECACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create the cache directory and persist default settings.
    Activate,
    /// Remove every cached page.
    Clear(AdminArgs),
    /// Show what is stored under a cache key.
    Inspect(InspectArgs),
    /// Show or change the cache settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Clear the cache and stop serving from it.
    Deactivate,
    /// Clear the cache and remove its persisted settings.
    Uninstall,
    /// Print a replay-protection token for an administrative action.
    Token(TokenArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the cache directory.
    #[arg(long = "cache-dir", value_name = "PATH", value_hint = ValueHint::DirPath, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Override the settings file.
    #[arg(long = "settings-file", value_name = "PATH", value_hint = ValueHint::FilePath, global = true)]
    pub settings_file: Option<PathBuf>,

    /// Override the number of listing pages removed per aggregate key.
    #[arg(long = "pagination-depth", value_name = "COUNT", global = true)]
    pub pagination_depth: Option<u32>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

/// Credentials every administrative command must present.
#[derive(Debug, Args, Default, Clone)]
pub struct AdminArgs {
    /// Administrator performing the action.
    #[arg(long = "user", value_name = "ID")]
    pub user_id: u64,

    /// Token issued by `pagecache token` for this action and user.
    #[arg(long = "token", value_name = "TOKEN", env = "PAGECACHE_ADMIN_TOKEN")]
    pub token: String,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    /// Full cache key, for example `cache_post_42`.
    #[arg(value_name = "KEY")]
    pub key: String,
}

#[derive(Debug, Subcommand, Clone)]
pub enum SettingsCommand {
    /// Print the persisted settings as TOML.
    Show,
    /// Change individual settings; omitted values are kept.
    Save(SettingsSaveArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct SettingsSaveArgs {
    #[command(flatten)]
    pub admin: AdminArgs,

    /// Cache the front page.
    #[arg(long = "cache-home", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub cache_home: Option<bool>,

    /// Cache the posts listing page.
    #[arg(long = "cache-blog", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub cache_blog: Option<bool>,

    /// Cache archive pages.
    #[arg(long = "cache-archive", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub cache_archive: Option<bool>,

    /// Cache static pages.
    #[arg(long = "cache-page", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub cache_page: Option<bool>,

    /// Emit cache diagnostics with every response.
    #[arg(long = "debug-mode", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub debug_mode: Option<bool>,

    /// Entry lifetime in seconds; clamped to 60..=86400.
    #[arg(long = "ttl", value_name = "SECONDS")]
    pub ttl: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct TokenArgs {
    /// Action the token authorizes.
    #[arg(value_enum, value_name = "ACTION")]
    pub action: TokenAction,

    /// Administrator the token is issued to.
    #[arg(long = "user", value_name = "ID")]
    pub user_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TokenAction {
    SaveSettings,
    ClearCache,
}
