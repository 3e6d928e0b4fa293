//! `cabletrace validate` command - Check a topology

use std::path::PathBuf;

use console::style;
use miette::Result;

use crate::cli::GlobalOpts;
use crate::core::topology::Topology;

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Topology file or directory of YAML files
    pub topology: PathBuf,

    /// Show the summary only, not each problem
    #[arg(long)]
    pub summary: bool,
}

pub fn run(args: ValidateArgs, _global: &GlobalOpts) -> Result<()> {
    let doc = Topology::read_document(&args.topology)?;
    let terminations = doc.terminations.len();
    let links = doc.cables.len() + doc.wireless_links.len();
    let mappings = doc.port_mappings.len();

    println!(
        "{} Validating {} termination(s), {} link(s), {} port mapping(s)...\n",
        style("→").blue(),
        terminations,
        links,
        mappings
    );

    let (_, errors) = Topology::from_document_lenient(doc);
    if errors.is_empty() {
        println!("{} {} is valid", style("✓").green(), args.topology.display());
        return Ok(());
    }

    let count = errors.len();
    if !args.summary {
        for error in errors {
            eprintln!("{:?}", miette::Report::new(error));
        }
    }
    Err(miette::miette!("{} problem(s) found in {}", count, args.topology.display()))
}
