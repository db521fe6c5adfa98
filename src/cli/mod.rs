//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod breakpoint;
mod transform;
mod url;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::util::Options;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// cldurl - Build media delivery URLs and transformation strings
#[derive(Parser)]
#[command(name = "cldurl")]
#[command(about = "cldurl - Build media delivery URLs and transformation strings")]
#[command(version)]
pub struct Cli {
    /// Log configuration layers and URL assembly to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the delivery URL of a public id
    Url {
        /// Public id (or remote URL for fetch delivery)
        public_id: String,

        /// URL or transformation option, repeatable (e.g. -o crop=fill -o width=100).
        /// Values are parsed as JSON when possible, else taken as strings.
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,

        /// Configuration file (default: discover cloudinary.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the transformation string for JSON transformation options
    Transform {
        /// Options hash, array of links, or named transformation, as JSON
        json: String,
    },
    /// Print a normalized expression
    Expr {
        /// Expression text, e.g. "width > 100 && face_count < 2"
        text: String,
    },
    /// Print the breakpoint width for a container width
    Breakpoint {
        /// Container width in pixels
        #[arg(long)]
        width: u32,

        /// Step of the default breakpoint function
        #[arg(long)]
        steps: Option<u32>,

        /// Comma-separated breakpoint widths
        #[arg(long)]
        breakpoints: Option<String>,
    },
}

/// Parse `key=value` pairs into an options hash.
///
/// Values that parse as JSON (`100`, `true`, `[1,2]`, `{"a":1}`) keep their
/// type; anything else is a string.
pub fn parse_options(pairs: &[String]) -> Result<Options, String> {
    let mut options = Options::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').ok_or_else(|| format!("Invalid option '{}': expected KEY=VALUE", pair))?;
        if key.is_empty() {
            return Err(format!("Invalid option '{}': empty key", pair));
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::from(raw));
        options.insert(key.to_string(), value);
    }
    Ok(options)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Url { public_id, options, config } => url::run_url(&public_id, &options, config.as_deref()),
        Commands::Transform { json } => transform::run_transform(&json),
        Commands::Expr { text } => transform::run_expr(&text),
        Commands::Breakpoint { width, steps, breakpoints } => {
            breakpoint::run_breakpoint(width, steps, breakpoints.as_deref())
        }
    }
}
