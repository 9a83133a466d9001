//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// Keeps the file log writer alive; taken and dropped before exit to flush.
pub static FILE_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> =
    Mutex::new(None);
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Used when `--config` is not given; missing means built-in defaults.
pub const DEFAULT_CONFIG: &str = "etc/dispenser.toml";

#[derive(Parser, Debug)]
#[command(name = "dispenser", version, about = "Medication dispenser controller")]
pub struct Cli {
    /// Path to config TOML [default: etc/dispenser.toml, if present]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print JSON lines instead of console text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control automaton until Ctrl-C
    Run {
        /// Stop after this many ticks
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
        /// Enable real-time mode (SCHED_FIFO, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority and mlockall to keep the process resident. This reduces jitter in echo timing but may require elevated privileges or ulimits (e.g., memlock)."
        )]
        rt: bool,
        /// SCHED_FIFO priority for --rt (clamped to the system range)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Memory locking mode for --rt: none, current, or all
        #[arg(long, value_enum, value_name = "MODE", default_value = "current")]
        rt_lock: RtLock,
    },
    /// Take one distance measurement
    Measure,
    /// Query the time server once and print the local time
    Sync,
    /// Sample every input once
    SelfCheck,
    /// Validate the configuration
    Health,
}
