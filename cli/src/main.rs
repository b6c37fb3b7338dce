//! briefwatch - binary entry point.
//!
//! ```text
//! main() -> load config -> build Services -> run | check | status
//!                                             |
//!                                             v
//!                          Monitor actor <-> stdin console (JSON lines)
//! ```
//!
//! stdout carries command output and alerts; diagnostics go to the log file.

mod console;
mod notifier;

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use briefwatch_browser::{ChromiumOptions, ChromiumTabs};
use briefwatch_config::BriefwatchConfig;
use briefwatch_engine::{
    Clock, CycleReport, FileSettingsStore, MemorySettingsStore, Monitor, PersistedState,
    PollCycle, Services, SettingsStore, SystemClock,
};
use briefwatch_types::MonitorSettings;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::notifier::TerminalNotifier;

const CONSOLE_HELP: &str = "\
Console commands (stdin, while running): start, stop, status, check, open,
interval <seconds>, quit, or a JSON object such as
{\"action\":\"setInterval\",\"intervalMs\":120000}.";

#[derive(Parser, Debug)]
#[command(name = "briefwatch", version)]
#[command(about = "Watch the Fiverr brief matches page and raise throttled alerts")]
#[command(after_help = CONSOLE_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Watch the briefs page and accept commands on stdin (default)
    Run,
    /// Run one poll cycle and print the result
    Check,
    /// Print persisted monitoring state and today's stats
    Status,
}

impl Cli {
    fn selected(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // stdout is reserved for command output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.briefwatch/logs/briefwatch.log
    if let Some(dir) = briefwatch_config::config_dir() {
        candidates.push(dir.join("logs").join("briefwatch.log"));
    }

    candidates.push(PathBuf::from(".briefwatch").join("logs").join("briefwatch.log"));

    candidates
}

fn load_config() -> Result<BriefwatchConfig> {
    let config = BriefwatchConfig::load().context("failed to load config")?;
    if config.is_none() {
        tracing::info!("No config file; using defaults");
    }
    Ok(config.unwrap_or_default())
}

/// File store when possible, otherwise an in-memory store for this run only.
fn open_store(config: &BriefwatchConfig) -> Arc<dyn SettingsStore> {
    let Some(path) = config.state_path() else {
        tracing::warn!("Home directory unknown; state will not persist");
        return Arc::new(MemorySettingsStore::new());
    };
    match FileSettingsStore::open(&path) {
        Ok(store) => {
            tracing::info!(path = %store.path().display(), "Settings store opened");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to open state at {}: {e}; state will not persist",
                path.display()
            );
            Arc::new(MemorySettingsStore::new())
        }
    }
}

async fn build_services(config: &BriefwatchConfig) -> Result<Services> {
    let browser = config.browser();
    let options = ChromiumOptions {
        debug_url: browser.debug_url,
        chromium_path: browser.chromium_path,
        headless: browser.headless,
    };
    let tabs = ChromiumTabs::start(&options)
        .await
        .context("failed to reach a browser")?;

    Ok(Services {
        store: open_store(config),
        tabs: Arc::new(tabs),
        notifier: Arc::new(TerminalNotifier::stdout()),
        clock: Arc::new(SystemClock),
    })
}

fn report_json(report: &CycleReport) -> serde_json::Value {
    json!({
        "verdict": report.verdict.kind().as_str(),
        "briefCount": report.verdict.brief_count(),
        "votes": report.observation.votes(),
        "observation": report.observation,
        "notified": report.notified,
        "stats": report.stats,
    })
}

fn status_json(
    state: &PersistedState,
    settings: &MonitorSettings,
    today: &str,
) -> serde_json::Value {
    json!({
        "enabled": state.enabled.unwrap_or(settings.auto_start),
        "intervalMs": state.interval_or(settings.default_interval).as_millis(),
        "lastNotificationTime": state.throttle.last_notification_at_ms,
        "stats": state.stats(today),
    })
}

async fn run_monitor(settings: &MonitorSettings, services: Services) -> Result<()> {
    let (handle, join) = Monitor::new(settings, services)
        .context("invalid monitor settings")?
        .spawn();
    tracing::info!(target_url = %settings.target_url, "Monitor started");

    console::run(handle).await?;
    join.await.context("monitor task failed")?;
    tracing::info!("Monitor stopped");
    Ok(())
}

async fn check_once(settings: &MonitorSettings, services: Services) -> Result<()> {
    let (events, _rx) = broadcast::channel(16);
    let cycle = PollCycle::new(settings, &services, events).context("invalid monitor settings")?;
    let report = cycle.run().await;
    println!("{}", report_json(&report));
    Ok(())
}

async fn print_status(config: &BriefwatchConfig, settings: &MonitorSettings) {
    let store = open_store(config);
    let state = PersistedState::load(store.as_ref()).await;
    let today = SystemClock.today();
    println!("{}", status_json(&state, settings, &today));
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    let config = load_config()?;
    let settings = config.resolve().context("invalid config")?;

    match cli.selected() {
        Commands::Run => run_monitor(&settings, build_services(&config).await?).await,
        Commands::Check => check_once(&settings, build_services(&config).await?).await,
        Commands::Status => {
            print_status(&config, &settings).await;
            Ok(())
        }
    }
}
