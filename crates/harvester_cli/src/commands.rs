//! Command-line surface of the harvester.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use engine_logging::{engine_info, engine_warn, LogDestination};
use harvester_engine::replay::{PortalFixture, ReplayDriver};
use harvester_engine::{
    harvest, load_config, send, write_manifest, CompletionOutcome, DirectoryUploadSink,
    HarvestEvent, HarvesterConfig, ProgressSink, UploadSink, MANIFEST_FILENAME,
};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

use crate::sync_state::{load_sync_state, next_cutoff, save_sync_state, SyncState};

/// Days looked back when neither `--since` nor a saved sync state exists.
const DEFAULT_LOOKBACK_DAYS: i64 = 1;

#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Harvests file transfers from a portal activity feed")]
#[command(version)]
pub struct Cli {
    /// Settings file (RON)
    #[arg(short, long, global = true, default_value = "harvester.ron")]
    config: PathBuf,

    /// Portal fixture (RON) replayed instead of a live portal
    #[arg(long, global = true, default_value = "portal.ron")]
    fixture: PathBuf,

    /// Where log output goes
    #[arg(long, global = true, value_enum, default_value = "both")]
    log: LogTarget,

    /// Log file path
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogTarget {
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download new matching transfers and publish their files
    Harvest {
        /// Only harvest activity newer than this RFC 3339 timestamp
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        /// Root directory files are published under
        #[arg(long, default_value = "published")]
        publish_dir: PathBuf,
        /// Key prefix inside the publish directory
        #[arg(long, default_value = "inputs")]
        prefix: String,
        /// Do not record the new cutoff after a complete scan
        #[arg(long)]
        no_state: bool,
    },

    /// Send local files to a recipient through the portal
    Send {
        /// Files to attach
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Recipient, overriding the configured one
        #[arg(short, long)]
        recipient: Option<String>,
    },

    /// Validate the settings file and print the effective configuration
    CheckConfig,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(cli.log.into(), level, cli.log_file.as_deref());

    let config = load_config(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;

    match cli.command {
        Commands::Harvest {
            since,
            publish_dir,
            prefix,
            no_state,
        } => cmd_harvest(&cli.fixture, &config, since, &publish_dir, &prefix, no_state).await,
        Commands::Send { files, recipient } => {
            cmd_send(&cli.fixture, config, &files, recipient).await
        }
        Commands::CheckConfig => cmd_check_config(&config),
    }
}

fn replay_driver(fixture_path: &Path, config: &HarvesterConfig) -> Result<Arc<ReplayDriver>> {
    let content = fs::read_to_string(fixture_path)
        .with_context(|| format!("reading portal fixture {}", fixture_path.display()))?;
    let fixture: PortalFixture = ron::from_str(&content)
        .with_context(|| format!("parsing portal fixture {}", fixture_path.display()))?;
    Ok(Arc::new(ReplayDriver::new(
        fixture,
        config.harvest.selectors.clone(),
    )))
}

/// Cancels the token on Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("Interrupted; finishing the current step");
            trigger.cancel();
        }
    });
    token
}

/// Prints harvest progress to stdout.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::ItemHarvested { identity, files } => {
                println!("  {identity}: {files} file(s)");
            }
            HarvestEvent::Finished { reason, files } => {
                println!("Finished ({reason}): {files} file(s)");
            }
            _ => {}
        }
    }
}

fn resolve_cutoff(since: Option<DateTime<Utc>>, state: &SyncState) -> DateTime<Utc> {
    since
        .or(state.last_sync)
        .unwrap_or_else(|| Utc::now() - Duration::days(DEFAULT_LOOKBACK_DAYS))
}

async fn cmd_harvest(
    fixture: &Path,
    config: &HarvesterConfig,
    since: Option<DateTime<Utc>>,
    publish_dir: &Path,
    prefix: &str,
    no_state: bool,
) -> Result<()> {
    let state = load_sync_state(publish_dir);
    let cutoff = resolve_cutoff(since, &state);
    let driver = replay_driver(fixture, config)?;
    let cancel = cancel_on_interrupt();

    println!("Harvesting activity newer than {}", cutoff.to_rfc3339());
    let report = harvest(driver, config, cutoff, &ConsoleProgress, &cancel).await?;

    let keys = DirectoryUploadSink::new(publish_dir, prefix).publish(&report.files)?;
    let manifest = write_manifest(publish_dir, &report, MANIFEST_FILENAME)?;
    for key in &keys {
        println!("  published {key}");
    }
    for failure in &report.failures {
        println!("  failed {}: {}", failure.identity, failure.reason);
    }
    println!("Manifest written to {}", manifest.display());

    if no_state {
        return Ok(());
    }
    match next_cutoff(&report) {
        Some(last_sync) => {
            save_sync_state(
                publish_dir,
                &SyncState {
                    last_sync: Some(last_sync),
                },
            )?;
            engine_info!("Next harvest starts after {}", last_sync);
        }
        None => engine_info!(
            "Keeping previous cutoff; scan ended with {}",
            report.stop_reason
        ),
    }
    Ok(())
}

async fn cmd_send(
    fixture: &Path,
    mut config: HarvesterConfig,
    files: &[PathBuf],
    recipient: Option<String>,
) -> Result<()> {
    if recipient.is_some() {
        config.session.recipient = recipient;
    }
    let driver = replay_driver(fixture, &config)?;
    let cancel = cancel_on_interrupt();

    match send(driver, &config, files, &cancel).await? {
        CompletionOutcome::Completed { status } => println!("Sent: {status}"),
        CompletionOutcome::AssumedSuccess => {
            println!("Sent (portal gave no confirmation)")
        }
    }
    Ok(())
}

fn cmd_check_config(config: &HarvesterConfig) -> Result<()> {
    let mut shown = config.clone();
    if !shown.session.password.is_empty() {
        shown.session.password = "********".to_string();
    }
    let pretty = ron::ser::to_string_pretty(&shown, ron::ser::PrettyConfig::new())?;
    println!("{pretty}");
    Ok(())
}
