//! Command-line interface

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// California housing price inference service
#[derive(Debug, Parser)]
#[command(name = "housing-inference", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "HOUSING_JSON_LOGS")]
    pub json_logs: bool,

    /// Only print results
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP inference server
    Serve(ServeArgs),

    /// Run a single prediction without starting the server
    Predict(PredictArgs),
}

/// Flags for `serve`; unset flags fall back to `HOUSING_*` variables
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Model artifact path
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Line-log audit sink
    #[arg(long)]
    pub audit_log: Option<PathBuf>,

    /// CSV audit table sink
    #[arg(long)]
    pub audit_table: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    /// Model artifact path
    #[arg(
        short,
        long,
        env = "HOUSING_MODEL_PATH",
        default_value = crate::config::DEFAULT_MODEL_PATH
    )]
    pub model: PathBuf,

    /// File containing the feature record as JSON
    #[arg(short, long, conflicts_with = "json")]
    pub input: Option<PathBuf>,

    /// Feature record as an inline JSON string
    #[arg(long)]
    pub json: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json_output: bool,
}
