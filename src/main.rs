//! cadvisor-charm - converges the cAdvisor daemon for one lifecycle hook.

use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cadvisor_charm::config::{ConfigView, Settings};
use cadvisor_charm::error::CharmError;
use cadvisor_charm::host::{
    AptPackageManager, HookTools, Host, HttpFetcher, Status, StatusReporter, SystemdServiceManager,
};
use cadvisor_charm::journal::{Journal, JournalLogger, NullJournal};
use cadvisor_charm::lifecycle::Dispatcher;
use cadvisor_charm::registration::{HttpTransport, RegistrationClient};
use cadvisor_charm::state::FileStateStore;
use cadvisor_charm::templates::TemplateEngine;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

const DEFAULT_SETTINGS_PATH: &str = "/etc/cadvisor-charm/settings.toml";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let settings_path = get_settings_path(&args);

    let Some(hook) = get_hook_name(&args) else {
        eprintln!("No hook name given\n");
        print_help();
        return ExitCode::FAILURE;
    };

    let settings = match Settings::load_or_default(&settings_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {} v{}", NAME, VERSION);
    info!("Settings loaded from: {}", settings_path);
    info!("Hook: {}", hook);

    match run(settings, &hook) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, code = e.code(), "Hook failed");
            ExitCode::FAILURE
        }
    }
}

/// Wire the production collaborators together and run one pass.
fn run(settings: Settings, hook: &str) -> Result<(), CharmError> {
    let limits = &settings.limits;
    let tools = HookTools::new(Duration::from_secs(limits.hook_tool_timeout_seconds));

    let identity = tools.unit_identity()?;
    let raw_options = tools.config_get()?;

    let host = Host {
        packages: Box::new(AptPackageManager::new(Duration::from_secs(limits.package_timeout_seconds))),
        services: Box::new(SystemdServiceManager::new(Duration::from_secs(limits.service_timeout_seconds))),
        ports: Box::new(tools.clone()),
        status: Box::new(tools.clone()),
        fetcher: Box::new(HttpFetcher::new()),
        upstream: Box::new(tools.relation(&settings.relations.upstream)),
        principal: Box::new(tools.relation(&settings.relations.principal)),
    };

    let store = FileStateStore::open(&settings.paths.state_file)?;
    let registry = RegistrationClient::new(Box::new(HttpTransport::new()), identity, &settings.service.charm_name);
    let templates = TemplateEngine::with_overrides(settings.paths.templates_dir.as_deref())?;
    let journal = open_journal(&settings);

    let mut dispatcher = Dispatcher::new(settings, host, Box::new(store), registry, templates, journal);

    let config = match ConfigView::new(raw_options, dispatcher.previous_options()) {
        Ok(config) => config,
        Err(e) => {
            let mut status = tools.clone();
            if let Err(status_err) = status.set_status(&Status::blocked(format!("Invalid configuration: {}", e))) {
                warn!(error = %status_err, "Failed to report blocked status");
            }
            return Err(e);
        }
    };

    dispatcher.dispatch(hook, &config)?;
    Ok(())
}

/// Pass journal, or a null journal when disabled or unwritable.
fn open_journal(settings: &Settings) -> Box<dyn Journal> {
    if !settings.journal.enabled {
        return Box::new(NullJournal::new());
    }
    match JournalLogger::new(&settings.journal.path) {
        Ok(logger) => Box::new(logger),
        Err(e) => {
            warn!(
                path = %settings.journal.path.display(),
                error = %e,
                "Pass journal unavailable, continuing without it"
            );
            Box::new(NullJournal::new())
        }
    }
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Converges the cAdvisor metrics daemon for one lifecycle hook.

USAGE:
    {} [OPTIONS] <HOOK>

ARGS:
    <HOOK>                 Hook to run (install, config-changed, start, stop,
                           update-status, upgrade-charm, <relation>-relation-*).
                           Defaults to $JUJU_HOOK_NAME, then to the name the
                           binary was invoked under.

OPTIONS:
    -c, --config <PATH>    Path to settings file
                           [default: {}]
    -h, --help             Print help information
    -V, --version          Print version information
"#,
        NAME, VERSION, NAME, DEFAULT_SETTINGS_PATH
    );
}

/// Get settings file path from command line arguments.
fn get_settings_path(args: &[String]) -> String {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_SETTINGS_PATH.to_string()
}

/// Hook name: first positional argument, `JUJU_HOOK_NAME`, or the name of a
/// `hooks/<name>` symlink pointing at this binary.
fn get_hook_name(args: &[String]) -> Option<String> {
    let mut skip_next = false;
    for arg in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--config" || arg == "-c" {
            skip_next = true;
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return Some(arg.clone());
    }

    if let Ok(name) = env::var("JUJU_HOOK_NAME") {
        if !name.is_empty() {
            return Some(name);
        }
    }

    args.first()
        .and_then(|argv0| Path::new(argv0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| name != NAME)
}

/// Initialize logging based on settings.
///
/// Hook output is captured by the framework, so logs go to stderr.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
