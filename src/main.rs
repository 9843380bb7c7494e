// brew-services-tui - view and control Homebrew services from a terminal
//
// This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use brew_services_tui::app::App;
use brew_services_tui::app::brew::BrewCli;
use brew_services_tui::app::engine::SyncEngine;
use brew_services_tui::{config, logging};

#[derive(Parser, Debug)]
#[command(name = "brew-services-tui")]
#[command(about = "View, start, stop and restart Homebrew services", long_about = None)]
struct Args {
    /// Path to the brew executable
    #[arg(long, value_name = "PATH")]
    brew: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds between background refreshes (0 disables)
    #[arg(long, value_name = "SECS")]
    refresh_interval: Option<u64>,

    /// Give up on a brew command after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = logging::init() {
        eprintln!("warning: {e}");
    }

    let mut settings = config::load_settings(args.config.as_deref());
    if let Some(brew) = args.brew {
        settings.executable = brew;
    }
    if let Some(secs) = args.refresh_interval {
        settings.refresh_interval_secs = secs;
    }
    if args.timeout.is_some() {
        settings.command_timeout_secs = args.timeout;
    }
    tracing::info!("Settings: {:?}", settings);

    let acting_user = settings.acting_user();

    // One worker thread is all the engine needs; the UI owns the main thread.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("brew-sync")
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let guard = runtime.enter();

    let brew = BrewCli::new(&settings.executable).with_timeout(settings.command_timeout());
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (engine, _task) = SyncEngine::new(brew, events_tx, acting_user.clone()).spawn();

    let mut terminal = ratatui::try_init().context("Failed to initialize terminal")?;
    let result = App::new(engine, events_rx, acting_user, settings.refresh_interval())
        .run(&mut terminal);
    ratatui::restore();
    drop(guard);

    // An in-flight brew command is not interruptible; don't wait on it forever.
    runtime.shutdown_timeout(Duration::from_secs(2));
    tracing::info!("brew-services-tui exiting");

    result
}
