//! Output formatting for paths

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::helpers::{hop_label, node_label};
use crate::cli::OutputFormat;
use crate::core::node::NodeRef;
use crate::core::path::CablePath;
use crate::core::topology::Topology;

/// A path plus the figures derived from the topology
#[derive(Serialize)]
struct PathView<'a> {
    #[serde(flatten)]
    path: &'a CablePath,

    #[serde(skip_serializing_if = "Option::is_none")]
    total_length_m: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    length_definitive: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    split_nodes: Vec<NodeRef>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    asymmetric_nodes: Vec<NodeRef>,
}

impl<'a> PathView<'a> {
    fn new(path: &'a CablePath, topology: Option<&Topology>) -> Self {
        let (total_length_m, length_definitive) = match topology {
            Some(t) => {
                let (length, definitive) = path.total_length(t);
                (Some(length), Some(definitive))
            }
            None => (None, None),
        };
        Self {
            path,
            total_length_m,
            length_definitive,
            split_nodes: topology.map(|t| path.split_nodes(t)).unwrap_or_default(),
            asymmetric_nodes: topology.map(|t| path.asymmetric_nodes(t)).unwrap_or_default(),
        }
    }
}

/// Print one path in the requested format
pub fn print_path(path: &CablePath, topology: Option<&Topology>, format: OutputFormat) -> Result<()> {
    let view = PathView::new(path, topology);
    match format {
        OutputFormat::Pretty => print_path_pretty(&view, topology),
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&view).into_diagnostic()?);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&view).into_diagnostic()?);
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            wtr.write_record(["hop", "node", "kind", "id", "label"])
                .into_diagnostic()?;
            for (i, hop) in path.path().iter().enumerate() {
                for node in hop {
                    wtr.write_record([
                        (i + 1).to_string(),
                        node.to_string(),
                        node.kind.to_string(),
                        node.id.to_string(),
                        node_label(topology, *node),
                    ])
                    .into_diagnostic()?;
                }
            }
            wtr.flush().into_diagnostic()?;
        }
    }
    Ok(())
}

fn print_path_pretty(view: &PathView<'_>, topology: Option<&Topology>) {
    let path = view.path;
    let origin = hop_label(topology, path.origins());
    println!("{} {}", style("Path from").bold(), style(origin).cyan());
    println!();

    for (i, hop) in path.path().iter().enumerate() {
        let label = hop_label(topology, hop);
        let label = if hop.iter().all(|n| n.is_link()) {
            style(label).dim().to_string()
        } else {
            label
        };
        println!("  {:>3}. {}", i + 1, label);
    }
    println!();

    let flag = |set: bool, name: &str| {
        if set {
            style(format!("✓ {}", name)).green().to_string()
        } else {
            style(format!("✗ {}", name)).red().to_string()
        }
    };
    println!(
        "  {}  {}  {}",
        flag(path.is_complete, "complete"),
        flag(path.is_active, "active"),
        if path.is_split {
            style("split").yellow().to_string()
        } else {
            style("not split").dim().to_string()
        }
    );

    if let (Some(length), Some(definitive)) = (view.total_length_m, view.length_definitive) {
        let qualifier = if definitive { "" } else { "at least " };
        println!("  Length: {}{:.2} m", qualifier, length);
    }
    if !view.split_nodes.is_empty() {
        println!(
            "  {} Split candidates: {}",
            style("!").yellow(),
            hop_label(topology, &view.split_nodes)
        );
    }
    if !view.asymmetric_nodes.is_empty() {
        println!(
            "  {} Unlinked pass-through ports: {}",
            style("!").yellow(),
            hop_label(topology, &view.asymmetric_nodes)
        );
    }
}

/// Summary row for path listings
#[derive(Tabled, Serialize)]
struct PathRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "ORIGIN")]
    origin: String,
    #[tabled(rename = "DESTINATION")]
    destination: String,
    #[tabled(rename = "HOPS")]
    hops: usize,
    #[tabled(rename = "COMPLETE")]
    complete: bool,
    #[tabled(rename = "ACTIVE")]
    active: bool,
    #[tabled(rename = "SPLIT")]
    split: bool,
}

impl PathRow {
    fn new(path: &CablePath) -> Self {
        let join = |nodes: &[NodeRef]| {
            nodes
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        Self {
            id: path.id.unwrap_or_default(),
            origin: join(path.origins()),
            destination: join(path.destinations()),
            hops: path.path().len(),
            complete: path.is_complete,
            active: path.is_active,
            split: path.is_split,
        }
    }
}

/// Print a list of stored paths
pub fn print_path_list(paths: &[CablePath], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Pretty => {
            if paths.is_empty() {
                println!("No paths found.");
                return Ok(());
            }
            let rows: Vec<PathRow> = paths.iter().map(PathRow::new).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
            println!(
                "\n{} path(s)",
                style(paths.len().to_string()).cyan()
            );
        }
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(paths).into_diagnostic()?),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(paths).into_diagnostic()?)
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for path in paths {
                wtr.serialize(PathRow::new(path)).into_diagnostic()?;
            }
            wtr.flush().into_diagnostic()?;
        }
    }
    Ok(())
}
