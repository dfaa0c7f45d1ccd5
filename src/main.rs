use std::{process::ExitCode, sync::Arc};

use pagecache::{
    application::{
        admin::{ActionTokens, AdminAction, AdminPrincipal, AdminService, SettingsForm},
        error::AppError,
        lifecycle::Lifecycle,
    },
    cache::{
        CacheKey, CacheSettings, CacheStore, Clock, FileStore, Hooks, InvalidationCoordinator,
        SharedSettings, SystemClock,
    },
    config::{
        self, AdminArgs, Command, LoadError, SettingsCommand, SettingsSaveArgs, TokenAction,
        TokenArgs,
    },
    domain::content::InMemoryTaxonomy,
    infra::{
        settings_store::{SettingsStore, TomlSettingsStore},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_application_error(&error);
            ExitCode::from(error.exit_code())
        }
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %report.render(), source = report.source, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %report.render(), source = report.source, "application error");
    });
}

/// Everything a command needs, wired the way a host would at startup.
struct Runtime {
    store: Arc<FileStore>,
    settings_store: Arc<dyn SettingsStore>,
    settings: SharedSettings,
    /// Present only when an admin token secret is configured.
    admin: Option<AdminService>,
    lifecycle: Lifecycle,
}

fn build_runtime(settings: &config::Settings) -> Result<Runtime, AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(FileStore::open(&settings.cache.directory, clock.clone())?);
    let settings_store: Arc<dyn SettingsStore> =
        Arc::new(TomlSettingsStore::new(&settings.cache.settings_file));
    let shared = SharedSettings::new(settings_store.load_or_default()?);

    let coordinator = Arc::new(
        InvalidationCoordinator::new(
            store.clone(),
            shared.clone(),
            Arc::new(InMemoryTaxonomy::new()),
        )
        .with_pagination_depth(settings.cache.pagination_depth),
    );

    let mut hooks = Hooks::new();
    hooks.subscribe(coordinator.clone());
    let lifecycle = Lifecycle::new(Arc::new(hooks), settings_store.clone(), shared.clone());

    let admin = settings.admin.token_secret.as_ref().map(|secret| {
        AdminService::new(
            settings_store.clone(),
            shared.clone(),
            coordinator,
            ActionTokens::new(secret.clone(), clock),
        )
    });

    Ok(Runtime {
        store,
        settings_store,
        settings: shared,
        admin,
        lifecycle,
    })
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;
    info!(
        cache_dir = %settings.cache.directory.display(),
        settings_file = %settings.cache.settings_file.display(),
        "Configuration loaded"
    );

    let runtime = build_runtime(&settings)?;
    execute(&runtime, cli_args.command)
}

fn execute(runtime: &Runtime, command: Command) -> Result<(), AppError> {
    match command {
        Command::Activate => run_activate(runtime),
        Command::Clear(args) => run_clear(runtime, &args),
        Command::Inspect(args) => run_inspect(runtime, &args.key),
        Command::Settings(SettingsCommand::Show) => run_settings_show(runtime),
        Command::Settings(SettingsCommand::Save(args)) => run_settings_save(runtime, &args),
        Command::Deactivate => {
            runtime.lifecycle.deactivate();
            println!("page cache deactivated");
            Ok(())
        }
        Command::Uninstall => {
            runtime.lifecycle.uninstall()?;
            println!("page cache uninstalled");
            Ok(())
        }
        Command::Token(args) => run_token(runtime, &args),
    }
}

fn admin_service(runtime: &Runtime) -> Result<&AdminService, AppError> {
    runtime.admin.as_ref().ok_or_else(|| {
        AppError::Config(LoadError::Invalid {
            key: "admin.token_secret",
            reason: "required for administrative commands".to_string(),
        })
    })
}

fn run_token(runtime: &Runtime, args: &TokenArgs) -> Result<(), AppError> {
    let action = match args.action {
        TokenAction::SaveSettings => AdminAction::SaveSettings,
        TokenAction::ClearCache => AdminAction::ClearCache,
    };
    println!("{}", admin_service(runtime)?.tokens().issue(action, args.user_id));
    Ok(())
}

fn run_activate(runtime: &Runtime) -> Result<(), AppError> {
    let active = runtime.lifecycle.activate()?;
    println!(
        "page cache active in {} (ttl {}s)",
        runtime.store.dir().display(),
        active.ttl_seconds
    );
    Ok(())
}

fn run_clear(runtime: &Runtime, args: &AdminArgs) -> Result<(), AppError> {
    let report = admin_service(runtime)?
        .clear_cache(&AdminPrincipal::administrator(args.user_id), &args.token)?;
    let removed = report.cleared.unwrap_or(0);

    if !report.is_complete() {
        return Err(AppError::unexpected(format!(
            "cache clear incomplete after removing {removed} entries"
        )));
    }
    println!("removed {removed} cached pages");
    Ok(())
}

fn run_inspect(runtime: &Runtime, raw_key: &str) -> Result<(), AppError> {
    let raw_key = raw_key.trim();
    if raw_key.is_empty() {
        return Err(AppError::validation("cache key must not be empty"));
    }

    let key = CacheKey::new(raw_key);
    println!("key:     {key}");
    println!("file:    {}.cache", key.digest());

    let Some(expires_at) = runtime.store.expiration_of(&key) else {
        println!("status:  absent");
        return Ok(());
    };
    println!("expires: {expires_at}");
    match runtime.store.get(&key) {
        Some(content) => {
            println!("status:  fresh");
            println!("bytes:   {}", content.len());
        }
        None => println!("status:  expired"),
    }
    Ok(())
}

fn run_settings_show(runtime: &Runtime) -> Result<(), AppError> {
    let current = runtime.settings_store.load_or_default()?;
    let encoded = toml::to_string_pretty(&current)
        .map_err(|err| AppError::unexpected(format!("failed to encode settings: {err}")))?;
    print!("{encoded}");
    Ok(())
}

fn run_settings_save(runtime: &Runtime, args: &SettingsSaveArgs) -> Result<(), AppError> {
    let form = settings_form(&runtime.settings.snapshot(), args);
    let saved = admin_service(runtime)?.save_settings(
        &AdminPrincipal::administrator(args.admin.user_id),
        &args.admin.token,
        &form,
    )?;

    if let Some(requested) = args.ttl
        && u64::from(saved.ttl_seconds) != requested
    {
        println!("ttl {requested}s clamped to {}s", saved.ttl_seconds);
    }
    println!("settings saved");
    Ok(())
}

/// The current settings as a form, with the flags given on the command line applied.
fn settings_form(current: &CacheSettings, args: &SettingsSaveArgs) -> SettingsForm {
    let mut form = SettingsForm::from_settings(current);
    let tick = |slot: &mut Option<String>, value: Option<bool>| {
        if let Some(on) = value {
            *slot = on.then(|| "1".to_string());
        }
    };
    tick(&mut form.cache_home, args.cache_home);
    tick(&mut form.cache_blog, args.cache_blog);
    tick(&mut form.cache_archive, args.cache_archive);
    tick(&mut form.cache_page, args.cache_page);
    tick(&mut form.debug_mode, args.debug_mode);
    if let Some(ttl) = args.ttl {
        form.ttl_seconds = Some(ttl.to_string());
    }
    form
}
