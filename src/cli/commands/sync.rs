//! `cabletrace sync` command - Rebuild the path store from a topology

use std::path::PathBuf;

use console::style;
use miette::Result;
use tracing::debug;

use crate::cli::helpers::{db_path, load_config};
use crate::cli::GlobalOpts;
use crate::core::reactor::Reactor;
use crate::core::store::{PathStore, META_TOPOLOGY_FINGERPRINT};
use crate::core::topology::Topology;

#[derive(clap::Args, Debug)]
pub struct SyncArgs {
    /// Topology file or directory of YAML files
    pub topology: PathBuf,

    /// Path database (default: store.path, then .cabletrace.db next to the topology)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Rebuild even if the topology is unchanged
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: SyncArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let db = db_path(args.db.as_deref(), &config, &args.topology);
    let fingerprint = Topology::fingerprint(&args.topology)?;

    let store = PathStore::open(&db)?;
    if !args.force {
        if let Some(previous) = store.get_meta(META_TOPOLOGY_FINGERPRINT)? {
            if previous == fingerprint {
                println!(
                    "{} Paths are up to date ({} stored)",
                    style("✓").green(),
                    store.count()?
                );
                return Ok(());
            }
            debug!("topology changed since last sync: {} -> {}", previous, fingerprint);
        }
    }

    let topology = Topology::load(&args.topology)?;
    let mut reactor = Reactor::new(topology, store, config.trace);
    let report = reactor.rebuild_all()?;
    let (_, mut store) = reactor.into_parts();
    store.set_meta(META_TOPOLOGY_FINGERPRINT, &fingerprint)?;

    println!(
        "{} Synced {} path(s) into {}",
        style("✓").green(),
        style(report.created).cyan(),
        db.display()
    );
    Ok(())
}
