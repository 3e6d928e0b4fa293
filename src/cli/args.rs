//! Command-line argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    apply::ApplyArgs, completions::CompletionsArgs, paths::PathsCommands,
    profiles::ProfilesArgs, sync::SyncArgs, trace::TraceArgs, validate::ValidateArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "cabletrace",
    version,
    about = "Trace cable paths through patch panels, trunks and circuits",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options accepted by every command
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Configuration file (default: $CABLETRACE_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable
    Pretty,
    Yaml,
    Json,
    Csv,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Trace a path from one or more origin terminations
    Trace(TraceArgs),

    /// Rebuild every stored path from a topology
    Sync(SyncArgs),

    /// Inspect stored paths
    #[command(subcommand)]
    Paths(PathsCommands),

    /// Apply topology changes and update stored paths
    Apply(ApplyArgs),

    /// Check a topology for invalid cables, mappings and circuits
    Validate(ValidateArgs),

    /// List the cable profile catalog
    Profiles(ProfilesArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
