use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use motionminder::{
    delete_store, init_logging, Config, MotionEvent, MotionMinder, BUILD_DATE, VERSION,
};

#[derive(Parser)]
#[command(name = "motionminder", version, about = "Axis odometer and maintenance tracker")]
struct Args {
    /// Configuration file (.json or .toml); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Run one console command, e.g. "SET_MAINTENANCE=50 AXES=z RELATIVE=True"
    Command {
        /// Command words; joined with spaces
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },
    /// Read host events (JSON, one per line) and console commands from stdin
    Feed,
    /// Print odometer and maintenance state
    Stats,
    /// Remove the odometer store
    DeleteStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    init_logging(level, args.log_file.as_deref())?;
    tracing::debug!("motionminder {} (built {})", VERSION, BUILD_DATE);

    let config = Config::load_or_default(args.config.as_deref())
        .with_context(|| "failed to load configuration")?;

    match args.action {
        Action::DeleteStore => {
            if delete_store(&config.storage.path)? {
                println!("Removed {}", config.storage.path.display());
            } else {
                println!("No store at {}", config.storage.path.display());
            }
        }
        Action::Stats => {
            let minder = MotionMinder::new(config)?;
            println!("{}", minder.execute_line("STATS=TRUE").await?);
        }
        Action::Command { words } => {
            let minder = MotionMinder::new(config)?;
            let response = minder.execute_line(&words.join(" ")).await;
            minder.shutdown()?;
            println!("{}", response?);
        }
        Action::Feed => feed(MotionMinder::new(config)?).await?,
    }

    Ok(())
}

/// Drive the tracker from stdin until end of input
///
/// Lines starting with `{` are host events; anything else is a console
/// command. Lines are applied in order and bad lines are reported and skipped.
async fn feed(minder: MotionMinder) -> anyhow::Result<()> {
    let (lines_tx, mut lines_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    // Stdin is blocking; read it off the runtime.
    let reader = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        for line in std::io::stdin().lock().lines() {
            if lines_tx.send(line?).is_err() {
                break;
            }
        }
        Ok(())
    });

    while let Some(line) = lines_rx.recv().await {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('{') {
            match MotionEvent::from_json(line) {
                Ok(event) => {
                    if let Err(e) = minder.handle_event(&event) {
                        tracing::error!("Failed to record motion: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Ignoring malformed event '{}': {}", line, e),
            }
        } else {
            match minder.execute_line(line).await {
                Ok(response) => println!("{}", response),
                Err(e) => println!("Error: {}", e),
            }
        }
    }

    minder.shutdown()?;
    reader.await.context("stdin reader failed")??;
    Ok(())
}
