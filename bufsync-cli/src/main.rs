//! # bufsync
//!
//! CLI tool for exercising the bufsync protocol end to end.
//!
//! ## Commands
//!
//! - `replay`: Feed a JSON-lines recording of editor events through a
//!   session and print one JSON response per event
//! - `check-config`: Load and validate a configuration file
//!
//! ## Example
//!
//! ```bash
//! # Replay a recording, with cache decisions logged to stderr
//! RUST_LOG=bufsync_core=debug bufsync replay session.jsonl
//!
//! # Replay from stdin with a custom configuration
//! cat session.jsonl | bufsync --config bufsync.toml replay -
//!
//! # Validate a configuration file
//! bufsync --config bufsync.toml check-config
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use bufsync_daemon::Config;

mod commands;

use commands::{check_config, replay};

/// CLI tool for exercising the bufsync protocol.
#[derive(Parser, Debug)]
#[command(name = "bufsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults apply when omitted)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON-lines recording of editor events
    Replay {
        /// Recording to read ("-" for stdin)
        input: PathBuf,

        /// Reset the session after this many events (simulates idle timeouts)
        #[arg(long)]
        reset_every: Option<usize>,
    },

    /// Load and validate the configuration, then print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    init_logging(&config);

    match cli.command {
        Commands::Replay { input, reset_every } => {
            replay::run(&config, &input, reset_every).await?;
        }
        Commands::CheckConfig => {
            check_config::run(&config, cli.config.as_deref());
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` wins over
/// the configured filter.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
