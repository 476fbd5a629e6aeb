//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// herdcache - coalesced cache-aside reads
///
/// Serves records through a cache, making sure concurrent misses for the
/// same key reach the backing store only once.
#[derive(Parser, Debug)]
#[command(name = "herdcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "HERDCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve customer reads over HTTP
    Serve(ServeArgs),

    /// Fire concurrent reads for one key and report what reached the store
    Probe(ProbeArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Listen address (overrides server.bind)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Number of customers to seed (overrides store.seed)
    #[arg(long)]
    pub seed: Option<usize>,
}

/// Arguments for the probe command
#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Record id to read
    pub id: String,

    /// Number of concurrent reads
    #[arg(short = 'n', long, default_value = "100")]
    pub concurrency: usize,

    /// Read without coalescing, for comparison
    #[arg(long)]
    pub uncoalesced: bool,

    /// Leave the record out of the store so every read fails
    #[arg(long)]
    pub absent: bool,

    /// Store lookup latency in milliseconds (overrides store.latency_ms)
    #[arg(long)]
    pub latency_ms: Option<u64>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}
