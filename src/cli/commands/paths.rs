//! `cabletrace paths` command - Inspect stored paths

use std::path::PathBuf;

use miette::Result;

use crate::cli::helpers::{load_config, required_db_path, resolve_nodes};
use crate::cli::{output, GlobalOpts};
use crate::core::store::PathStore;
use crate::core::topology::Topology;

#[derive(clap::Subcommand, Debug)]
pub enum PathsCommands {
    /// List stored paths
    List(ListArgs),

    /// Show the path originating at a termination
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Path database (default: store.path)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Only paths passing through this node (<kind>:<id>)
    #[arg(long)]
    pub through: Option<String>,

    /// Only incomplete paths
    #[arg(long)]
    pub incomplete: bool,

    /// Only split paths
    #[arg(long)]
    pub split: bool,

    /// Only inactive paths
    #[arg(long)]
    pub inactive: bool,

    /// Print the number of matching paths only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Origin termination (<kind>:<id>, or a name with --topology)
    pub origin: String,

    /// Path database (default: store.path)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Topology, for names, lengths and split candidates
    #[arg(long)]
    pub topology: Option<PathBuf>,
}

pub fn run(cmd: PathsCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        PathsCommands::List(args) => run_list(args, global),
        PathsCommands::Show(args) => run_show(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let store = PathStore::open(&required_db_path(args.db.as_deref(), &config)?)?;

    let mut paths = match &args.through {
        Some(node) => {
            let nodes = resolve_nodes(None, std::slice::from_ref(node))?;
            store.paths_through(nodes[0])?
        }
        None => store.all()?,
    };
    paths.retain(|p| {
        (!args.incomplete || !p.is_complete)
            && (!args.split || p.is_split)
            && (!args.inactive || !p.is_active)
    });

    if args.count {
        println!("{}", paths.len());
        return Ok(());
    }
    output::print_path_list(&paths, global.format)
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let store = PathStore::open(&required_db_path(args.db.as_deref(), &config)?)?;
    let topology = args.topology.as_deref().map(Topology::load).transpose()?;

    let origin = resolve_nodes(topology.as_ref(), std::slice::from_ref(&args.origin))?[0];
    match store.path_for_origin(origin)? {
        Some(path) => output::print_path(&path, topology.as_ref(), global.format),
        None => Err(miette::miette!(
            help = "run `cabletrace sync` to build paths",
            "No stored path originates at {}",
            origin
        )),
    }
}
