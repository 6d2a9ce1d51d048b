//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use contracts::{LineOffset, PolarityFilter};

/// Pulse Mirror - reproduce input pulse widths on a set of outputs
#[derive(Parser, Debug)]
#[command(
    name = "pulse-mirror",
    author,
    version,
    about = "Edge-timing pulse mirror",
    long_about = "Measures the width of pulses on one digital input and drives \n\
                  proportional timed pulses on one or more digital outputs.\n\n\
                  Runs against the bundled simulated GPIO chip."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PULSE_MIRROR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PULSE_MIRROR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror input pulses onto the output lines
    Run(RunArgs),

    /// Record the input pulse train and print it
    Capture(CaptureArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Where the mirror setup comes from: a config file, flags, or both
/// (flags override the file)
#[derive(Args, Debug, Clone, Default)]
pub struct BlueprintArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "PULSE_MIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Input line offset
    #[arg(long, env = "PULSE_MIRROR_INPUT")]
    pub input: Option<LineOffset>,

    /// Output line offset (repeat for several outputs)
    #[arg(long = "output", value_name = "LINE")]
    pub outputs: Vec<LineOffset>,

    /// Simulated input: high time per cycle in microseconds
    #[arg(long, requires = "low_us")]
    pub high_us: Option<u64>,

    /// Simulated input: low time per cycle in microseconds
    #[arg(long, requires = "high_us")]
    pub low_us: Option<u64>,

    /// Simulated input: number of cycles (default: until stopped)
    #[arg(long)]
    pub cycles: Option<u64>,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub blueprint: BlueprintArgs,

    /// Output duration multiplier
    #[arg(long, env = "PULSE_MIRROR_SCALE")]
    pub scale: Option<f64>,

    /// Watchdog timeout for a pending edge, in microseconds
    #[arg(long, env = "PULSE_MIRROR_WATCHDOG_US")]
    pub watchdog_us: Option<u64>,

    /// Which measured pulses are mirrored
    #[arg(long, value_enum)]
    pub polarity: Option<PolarityArg>,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "PULSE_MIRROR_TIMEOUT")]
    pub timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PULSE_MIRROR_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `capture` command
#[derive(Parser, Debug, Clone)]
pub struct CaptureArgs {
    #[command(flatten)]
    pub blueprint: BlueprintArgs,

    /// How long to record, in milliseconds
    #[arg(long, default_value = "1000", env = "PULSE_MIRROR_CAPTURE_MS")]
    pub duration_ms: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pulse_mirror.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pulse_mirror.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

/// Pulse polarity selection
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PolarityArg {
    High,
    Low,
    Both,
}

impl From<PolarityArg> for PolarityFilter {
    fn from(arg: PolarityArg) -> Self {
        match arg {
            PolarityArg::High => PolarityFilter::High,
            PolarityArg::Low => PolarityFilter::Low,
            PolarityArg::Both => PolarityFilter::Both,
        }
    }
}
