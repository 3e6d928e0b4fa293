//! Shared helper functions for CLI commands

use std::path::{Path, PathBuf};

use miette::Result;

use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::core::node::NodeRef;
use crate::core::topology::Topology;

/// File name of the path database kept next to a topology
pub const DEFAULT_DB_NAME: &str = ".cabletrace.db";

/// Load configuration and apply its output settings
pub fn load_config(global: &GlobalOpts) -> Result<Config> {
    let config = Config::load(global.config.as_deref())?;
    if !config.output.color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
    Ok(config)
}

/// Database path: the `--db` flag, then `store.path`, then next to the topology
pub fn db_path(db: Option<&Path>, config: &Config, topology: &Path) -> PathBuf {
    if let Some(db) = db.or(config.store.path.as_deref()) {
        return db.to_path_buf();
    }
    let dir = if topology.is_dir() {
        topology
    } else {
        topology.parent().unwrap_or_else(|| Path::new("."))
    };
    dir.join(DEFAULT_DB_NAME)
}

/// Database path for commands that take no topology
pub fn required_db_path(db: Option<&Path>, config: &Config) -> Result<PathBuf> {
    db.or(config.store.path.as_deref())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            miette::miette!(
                help = "pass --db or set store.path in the config",
                "No path database given"
            )
        })
}

/// Resolve node arguments against a topology, or parse them as `<kind>:<id>`
pub fn resolve_nodes(topology: Option<&Topology>, refs: &[String]) -> Result<Vec<NodeRef>> {
    refs.iter()
        .map(|r| match topology {
            Some(topology) => Ok(topology.resolve(r)?),
            None => r
                .parse::<NodeRef>()
                .map_err(|e| miette::miette!(help = "use <kind>:<id>, e.g. interface:12", "{}", e)),
        })
        .collect()
}

/// `interface:1 (eth0)` when the node has a name, else `interface:1`
pub fn node_label(topology: Option<&Topology>, node: NodeRef) -> String {
    match topology
        .and_then(|t| t.get_termination(node))
        .filter(|t| !t.name.is_empty())
    {
        Some(termination) => format!("{} ({})", node, termination.name),
        None => node.to_string(),
    }
}

/// Labels of a hop joined with commas
pub fn hop_label(topology: Option<&Topology>, hop: &[NodeRef]) -> String {
    hop.iter()
        .map(|n| node_label(topology, *n))
        .collect::<Vec<_>>()
        .join(", ")
}
