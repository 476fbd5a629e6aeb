//! herdcache - coalesced cache-aside reads
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use herdcache::cli::{Cli, Commands};
use herdcache::config::ConfigManager;
use herdcache::error::HerdResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> HerdResult<()> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config.general.log_format);

    debug!("Loaded configuration from {}", config_manager.path().display());

    match cli.command {
        Commands::Serve(args) => herdcache::cli::commands::serve(args, &config).await,
        Commands::Probe(args) => herdcache::cli::commands::probe(args, &config).await,
        Commands::Config(args) => {
            herdcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// `RUST_LOG` wins when set; otherwise -v/-vv raise the level from warn
fn init_logging(verbose: u8, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "herdcache=warn",
            1 => "herdcache=info",
            _ => "herdcache=debug",
        })
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        "json" => builder.json().init(),
        _ => builder.with_target(false).init(),
    }
}
