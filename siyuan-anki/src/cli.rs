///
/// This module implements the CLI interface for siyuan-anki: argument parsing, wiring
/// of the real clients into the core engine, and the optional interval loop.
///
/// All planning and execution logic lives in the [`siyuan-anki-core`] crate. This
/// module is strictly glue.
///
/// ## How To Use
/// - For command-line users: `siyuan-anki sync --path <siyuan workspace>`; see `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`siyuan-anki-core`]: ../../siyuan-anki-core/
use crate::anki::AnkiConnectClient;
use crate::load_config::{resolve, AppConfig, SyncArgs};
use crate::presence::SystemProcessProbe;
use crate::siyuan::SiYuanClient;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use siyuan_anki_core::repository::SqliteBlockStore;
use siyuan_anki_core::synchronise::{synchronise, SyncReport};
use std::path::PathBuf;

/// CLI for siyuan-anki: mirror flagged SiYuan blocks into Anki flashcards.
#[derive(Parser)]
#[clap(
    name = "siyuan-anki",
    version,
    about = "Sync SiYuan blocks flagged with a card reference into Anki via AnkiConnect"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile Anki with the flagged blocks of a SiYuan workspace
    Sync(SyncCommand),
}

#[derive(Args, Debug, Clone)]
pub struct SyncCommand {
    /// SiYuan workspace directory (contains temp/siyuan.db and data/assets)
    #[clap(long)]
    pub path: PathBuf,
    /// Repeat the sync every N seconds instead of running once
    #[clap(long)]
    pub interval: Option<u64>,
    /// SiYuan API port [default: 6806]
    #[clap(long)]
    pub siyuan_port: Option<u16>,
    /// AnkiConnect port [default: 8765]
    #[clap(long)]
    pub anki_port: Option<u16>,
    /// Anki note model name [default: SiYuanModel]
    #[clap(long)]
    pub model: Option<String>,
    /// Optional YAML settings file
    #[clap(long)]
    pub config: Option<PathBuf>,
}

impl From<SyncCommand> for SyncArgs {
    fn from(cmd: SyncCommand) -> Self {
        SyncArgs {
            path: cmd.path,
            interval: cmd.interval,
            siyuan_port: cmd.siyuan_port,
            anki_port: cmd.anki_port,
            model: cmd.model,
            config: cmd.config,
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync(cmd) => {
            let app = resolve(&SyncArgs::from(cmd))?;
            app.sync.trace_loaded();
            let store = SqliteBlockStore::open(&app.sync.db_path())?;
            let anki = AnkiConnectClient::new(app.anki_url.clone());
            let siyuan = SiYuanClient::new(app.siyuan_url.clone(), app.siyuan_token.clone());

            let Some(period) = app.interval else {
                let report = sync_once(&app, &store, &anki, &siyuan).await?;
                print_report(&report);
                return Ok(());
            };

            tracing::info!(interval_secs = period.as_secs(), "Starting interval sync loop");
            loop {
                match sync_once(&app, &store, &anki, &siyuan).await {
                    Ok(report) => print_report(&report),
                    Err(e) => {
                        tracing::error!(command = "sync", error = %e, "Synchronisation failed, retrying next interval")
                    }
                }
                tokio::time::sleep(period).await;
            }
        }
    }
}

async fn sync_once(
    app: &AppConfig,
    store: &SqliteBlockStore,
    anki: &AnkiConnectClient,
    siyuan: &SiYuanClient,
) -> Result<SyncReport> {
    tracing::info!(command = "sync", "Starting synchronisation process");
    let probe = SystemProcessProbe::snapshot();
    match synchronise(&app.sync, store, anki, siyuan, &probe).await {
        Ok(report) => {
            tracing::info!(command = "sync", ?report, "Synchronisation complete");
            Ok(report)
        }
        Err(e) => {
            tracing::error!(command = "sync", error = %e, "Synchronisation failed");
            Err(e.into())
        }
    }
}

fn print_report(report: &SyncReport) {
    println!("{}", report.summary());
    if report.moved > 0 {
        println!("num of moved: {}", report.moved);
    }
    if !report.removed_decks.is_empty() {
        println!("removed empty decks: {}", report.removed_decks.join(", "));
    }
    if let Some((kind, message)) = &report.execution.failed {
        println!("stopped at {kind}: {message}");
    }
    if report.execution.item_failures > 0 {
        println!("failed items: {}", report.execution.item_failures);
    }
}
