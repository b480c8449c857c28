//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hotmod - hot-reloadable Rhai modules
#[derive(Parser)]
#[command(name = "hotmod")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (TOML, YAML or JSON)
    #[arg(short = 'c', long, global = true, env = "HOTMOD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load a module once and print its result
    Run {
        /// Module file
        file: PathBuf,

        /// Argument passed to the module, as JSON (repeatable)
        #[arg(short, long = "arg")]
        args: Vec<String>,
    },

    /// Hot-import a module and call it repeatedly while it is edited
    Watch {
        /// Module file
        file: PathBuf,

        /// Delay between calls in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,

        /// Stop after this many calls (runs until Ctrl-C when omitted)
        #[arg(short, long)]
        times: Option<u64>,

        /// Argument passed to the module, as JSON (repeatable)
        #[arg(short, long = "arg")]
        args: Vec<String>,
    },

    /// Compile a module without running it
    Check {
        /// Module file
        file: PathBuf,
    },
}
