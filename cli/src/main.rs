//! QuickProxy CLI - drives the reconciler against file-backed collaborators.
//!
//! # Architecture
//!
//! ```text
//! main() -> Host::open() -> Command::run() -> Reconciler handler
//!                                  |
//!                                  v
//!                       EventPump::drain() -> indicator line on stdout
//! ```
//!
//! The settings record and the live proxy document live under
//! `~/.quickproxy` (or `$QUICKPROXY_HOME`). Every invocation is one browser
//! event; notifications caused by it are delivered before the process exits.

mod live_file;

use anyhow::{Context, Result, bail};
use std::{
    env,
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::{Arc, Mutex, PoisonError},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use quickproxy_engine::{
    ApplyOutcome, ClickOutcome, Collaborators, EventPump, FileSettingsStore, IndicatorIcon,
    IndicatorView, LevelOfControl, OptionsEditor, ProxyConfig, QuickProxyConfig, Reconciler,
    SettingsCollection, SettingsName, base_dir, log_dir,
};

use crate::live_file::FileLiveProxy;

const USAGE: &str = "\
usage: quickproxy <command>

commands:
  init                         load or seed the settings and apply the current one
  toggle                       click the QuickProxy button
  status                       show the button state
  show                         print the stored settings record
  set <name> <json>            replace the 'default' or 'quick-proxy' configuration
  control <level>              change who controls the live proxy setting
  private <allow|deny>         grant or revoke private window access
  wipe                         clear the stored settings";

fn init_tracing(level: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("info")))
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

    // stdout carries command output; no log file means no logs.
    tracing_subscriber::registry().with(env_filter).init();
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
    vec![
        // Primary: ~/.quickproxy/logs/quickproxy.log
        log_dir(&base_dir()).join("quickproxy.log"),
        // Fallback: ./.quickproxy/logs/quickproxy.log
        PathBuf::from(".quickproxy")
            .join("logs")
            .join("quickproxy.log"),
    ]
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Init,
    Toggle,
    Status,
    Show,
    Set { name: SettingsName, config: ProxyConfig },
    Control(LevelOfControl),
    Private(bool),
    Wipe,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["init"] => Ok(Self::Init),
            ["toggle"] => Ok(Self::Toggle),
            ["status"] => Ok(Self::Status),
            ["show"] => Ok(Self::Show),
            ["wipe"] => Ok(Self::Wipe),
            ["set", name, json] => {
                let name = name.parse::<SettingsName>()?;
                let config = serde_json::from_str(json)
                    .with_context(|| format!("invalid proxy configuration for '{name}'"))?;
                Ok(Self::Set { name, config })
            }
            ["control", level] => Ok(Self::Control(LevelOfControl::from(*level))),
            ["private", "allow"] => Ok(Self::Private(true)),
            ["private", "deny"] => Ok(Self::Private(false)),
            [] => bail!("missing command"),
            [command, ..] => bail!("unknown command or arguments: {command}"),
        }
    }
}

/// Remembers the last view so it can be printed once the command is done.
#[derive(Default)]
struct TerminalIndicator {
    last: Mutex<Option<IndicatorView>>,
}

impl TerminalIndicator {
    fn last(&self) -> Option<IndicatorView> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl quickproxy_engine::Indicator for TerminalIndicator {
    fn render(&self, view: &IndicatorView) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(view.clone());
    }
}

fn format_view(view: &IndicatorView) -> String {
    let icon = match view.icon {
        IndicatorIcon::Active => "[on]",
        IndicatorIcon::Default => "[off]",
        IndicatorIcon::Error => "[!]",
    };
    if view.enabled {
        format!("{icon} {}", view.title)
    } else {
        format!("{icon} {} (disabled)", view.title)
    }
}

/// One line per named configuration, e.g.
/// `QuickProxy proxy settings: Manual proxy configuration`.
fn describe_settings(settings: &SettingsCollection) -> Vec<String> {
    settings
        .iter()
        .map(|(name, config)| format!("{}: {}", name.title(), config.proxy_type().label()))
        .collect()
}

fn describe_outcome(name: SettingsName, outcome: &ApplyOutcome) -> String {
    match outcome {
        ApplyOutcome::Applied => format!("applied {}", name.title()),
        ApplyOutcome::Blocked => format!("not applying {}, QuickProxy is blocked", name.title()),
        ApplyOutcome::NotChanged => format!("{} did not take effect", name.title()),
        ApplyOutcome::Rejected { message, .. } => {
            format!("{} was rejected: {message}", name.title())
        }
    }
}

struct Host {
    store: Arc<FileSettingsStore>,
    live: Arc<FileLiveProxy>,
    indicator: Arc<TerminalIndicator>,
    reconciler: Arc<Reconciler>,
    pump: EventPump,
}

impl Host {
    fn open(config: &QuickProxyConfig, base: &Path) -> Self {
        let store = Arc::new(FileSettingsStore::new(config.store_path(base)));
        let live = Arc::new(FileLiveProxy::new(config.live_path(base)));
        let indicator = Arc::new(TerminalIndicator::default());
        let reconciler = Arc::new(Reconciler::new(Collaborators {
            store: store.clone(),
            live: live.clone(),
            platform: live.clone(),
            indicator: indicator.clone(),
        }));
        let pump = EventPump::subscribe(reconciler.clone());
        Self {
            store,
            live,
            indicator,
            reconciler,
            pump,
        }
    }

    async fn run(mut self, command: Command) -> Result<()> {
        tracing::debug!(?command, "Running command");

        match command {
            Command::Init => {
                let outcome = self.reconciler.init().await?;
                let current = self
                    .reconciler
                    .state()
                    .current_settings_name
                    .unwrap_or_default();
                println!("{}", describe_outcome(current, &outcome));
            }
            Command::Toggle => match self.reconciler.on_action_clicked().await? {
                ClickOutcome::OpenedOptionsPage => {
                    println!(
                        "QuickProxy needs private window access, allow it with `quickproxy private allow`"
                    );
                }
                ClickOutcome::Toggled { target, outcome } => {
                    println!("{}", describe_outcome(target, &outcome));
                }
            },
            Command::Status => {
                if self.store.read_record().await?.settings.is_none() {
                    println!("QuickProxy is not initialized, run `quickproxy init`");
                    return Ok(());
                }
                self.reconciler.restore_or_init(false).await?;
                self.reconciler.refresh_indicator();
            }
            Command::Show => {
                let record = self.store.read_record().await?;
                println!("{}", serde_json::to_string_pretty(&record)?);
                if let Some(settings) = &record.settings {
                    for line in describe_settings(settings) {
                        println!("{line}");
                    }
                }
                return Ok(());
            }
            Command::Set { name, config } => {
                self.reconciler.ensure_initialized().await?;
                OptionsEditor::new(self.store.clone())
                    .save(name, config)
                    .await?;
                println!("saved {}", name.title());
            }
            Command::Control(level) => {
                self.reconciler.ensure_initialized().await?;
                self.live.set_level_of_control(level).await?;
            }
            Command::Private(allowed) => {
                self.live.set_private_windows_allowed(allowed).await?;
                self.reconciler.restore_or_init(false).await?;
                self.reconciler.refresh_indicator();
            }
            Command::Wipe => {
                self.store.wipe().await?;
            }
        }

        self.pump.drain().await;

        match self.indicator.last() {
            Some(view) => println!("{}", format_view(&view)),
            None => println!("{}", format_view(&self.reconciler.view())),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let (config, config_error) = match QuickProxyConfig::load() {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(e) => (QuickProxyConfig::default(), Some(e)),
    };
    init_tracing(config.log_level().as_deref());
    if let Some(e) = config_error {
        tracing::warn!(path = %e.path().display(), "Ignoring config: {e}");
    }

    let host = Host::open(&config, &base_dir());
    match host.run(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
