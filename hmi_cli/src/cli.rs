//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "hmi", version, about = "Injection machine HMI bridge")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/hmi_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides `[logging].level`
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the polling loop against the controller link
    Run {
        /// Replay controller lines from a file instead of opening the UART
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
        /// Stop after this many polling ticks (default: one per script line, or run until Ctrl-C)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// After the loop, select this profile and send it to the controller
        #[arg(long, value_name = "INDEX")]
        send_profile: Option<usize>,
        /// Print a snapshot every N ticks while running
        #[arg(long, value_name = "N")]
        snapshot_every: Option<u64>,
        /// Debug status override applied before polling (STATE|<name>, POS|<turns>, OFF); repeatable
        #[arg(long = "mock", value_name = "CMD")]
        mock: Vec<String>,
    },
    /// Inspect or edit the stored profile file
    Profiles {
        #[command(subcommand)]
        action: ProfilesCmd,
    },
    /// Health check for operational monitoring
    Health,
}

#[derive(Subcommand, Debug)]
pub enum ProfilesCmd {
    /// List stored profiles
    List,
    /// Hex dump of the raw profile file
    Dump,
    /// Append profiles from a CSV file (strict header)
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}
