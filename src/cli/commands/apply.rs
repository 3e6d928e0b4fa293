//! `cabletrace apply` command - Apply topology changes through the reactor

use std::path::PathBuf;

use console::style;
use miette::{IntoDiagnostic, Result};
use tracing::debug;

use crate::cli::helpers::{db_path, load_config};
use crate::cli::GlobalOpts;
use crate::core::reactor::{Reactor, TopologyChange};
use crate::core::store::{PathStore, META_TOPOLOGY_FINGERPRINT};
use crate::core::topology::Topology;
use crate::yaml::parse_yaml_file;

#[derive(clap::Args, Debug)]
pub struct ApplyArgs {
    /// Topology file or directory of YAML files
    pub topology: PathBuf,

    /// YAML list of change records
    pub changes: PathBuf,

    /// Path database (default: store.path, then .cabletrace.db next to the topology)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Write the changed topology back to the topology file
    #[arg(long)]
    pub write: bool,
}

pub fn run(args: ApplyArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    if args.write && args.topology.is_dir() {
        return Err(miette::miette!(
            help = "merge the topology into one file, or apply without --write",
            "--write needs a single topology file, not a directory"
        ));
    }

    let topology = Topology::load(&args.topology)?;
    let changes: Vec<TopologyChange> = parse_yaml_file(&args.changes)?;
    let db = db_path(args.db.as_deref(), &config, &args.topology);
    let store = PathStore::open(&db)?;

    let fingerprint = Topology::fingerprint(&args.topology)?;
    let in_sync = store.get_meta(META_TOPOLOGY_FINGERPRINT)?.as_deref() == Some(fingerprint.as_str());

    let mut reactor = Reactor::new(topology, store, config.trace);
    if !in_sync {
        debug!("store out of date, rebuilding before applying changes");
        reactor.rebuild_all()?;
    }

    let count = changes.len();
    for change in &changes {
        println!("  {} {}", style("→").blue(), change);
    }
    let report = reactor.apply_batch(changes)?;

    let (topology, mut store) = reactor.into_parts();
    if args.write {
        let yaml = serde_yml::to_string(&topology.to_document()).into_diagnostic()?;
        std::fs::write(&args.topology, yaml).into_diagnostic()?;
        store.set_meta(
            META_TOPOLOGY_FINGERPRINT,
            &Topology::fingerprint(&args.topology)?,
        )?;
    } else {
        // The store now reflects a topology the files do not describe
        store.set_meta(META_TOPOLOGY_FINGERPRINT, "")?;
    }

    println!(
        "{} Applied {} change(s): {} path(s) created, {} deleted, {} deactivated",
        style("✓").green(),
        count,
        report.created,
        report.deleted,
        report.deactivated
    );
    Ok(())
}
