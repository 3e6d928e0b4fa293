//! `cabletrace trace` command - Trace a path without touching the store

use std::path::PathBuf;

use console::style;
use miette::Result;

use crate::cli::helpers::{hop_label, load_config, resolve_nodes};
use crate::cli::{output, GlobalOpts};
use crate::core::topology::Topology;
use crate::core::tracer::trace;

#[derive(clap::Args, Debug)]
pub struct TraceArgs {
    /// Topology file or directory of YAML files
    pub topology: PathBuf,

    /// Origin terminations, as <kind>:<id> or a unique name
    #[arg(required = true)]
    pub origins: Vec<String>,

    /// Hop budget (overrides trace.max_hops)
    #[arg(long)]
    pub max_hops: Option<usize>,

    /// Treat circuits ending on a site or region as complete
    #[arg(long)]
    pub sink_complete: bool,
}

pub fn run(args: TraceArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let topology = Topology::load(&args.topology)?;
    let origins = resolve_nodes(Some(&topology), &args.origins)?;

    let mut trace_config = config.trace.clone();
    if let Some(max_hops) = args.max_hops {
        trace_config.max_hops = max_hops;
    }
    if args.sink_complete {
        trace_config.sink_paths_complete = true;
    }

    match trace(&topology, &origins, &trace_config)? {
        Some(path) => output::print_path(&path, Some(&topology), global.format),
        None => {
            println!(
                "{} Nothing attached to {}",
                style("!").yellow(),
                hop_label(Some(&topology), &origins)
            );
            Ok(())
        }
    }
}
