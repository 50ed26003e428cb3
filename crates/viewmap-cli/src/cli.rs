//! CLI argument definitions for `viewmap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use viewmap_cli::replay::SinkKind;

#[derive(Parser)]
#[command(
    name = "viewmap",
    version,
    about = "Replay view mapping scenarios and print every batch a view receives",
    long_about = "Replay view mapping scenarios against an in-memory store.\n\n\
                  Each step of a scenario commits store edits or changes the active\n\
                  mappings; the batches the view receives are printed as tables."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format.
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay a scenario and print every batch.
    Replay(ReplayArgs),

    /// Parse and validate a scenario without replaying it into a view.
    Check(CheckArgs),
}

#[derive(Parser)]
pub struct ReplayArgs {
    /// Path to the scenario JSON file.
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// View the scenario is replayed into.
    #[arg(long = "sink", value_enum, default_value = "list")]
    pub sink: SinkArg,

    /// Apply every update as a full reload.
    #[arg(long = "no-animate")]
    pub no_animate: bool,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Path to the scenario JSON file.
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SinkArg {
    List,
    Grid,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::List => Self::List,
            SinkArg::Grid => Self::Grid,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
